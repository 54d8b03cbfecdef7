//! Sliding-window rate limiter.
//!
//! One sorted set of request timestamps per sender. Each check runs a
//! single pipeline: trim entries older than the window, count what is left,
//! insert the new timestamp, refresh the key TTL. The request is rejected
//! when the pre-insert count has already reached the limit.

use chrono::Utc;
use redis::aio::ConnectionManager;
use tracing::{error, warn};

use crate::sanitize_key;

const RATE_LIMIT_PREFIX: &str = "ratelimit:";

/// Default requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 30;

/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;

/// Sliding-window limiter over the shared store.
#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
    max_requests: u32,
    window_seconds: u64,
}

impl RateLimiter {
    /// Build a limiter with explicit bounds.
    #[must_use]
    pub fn new(conn: ConnectionManager, max_requests: u32, window_seconds: u64) -> Self {
        Self {
            conn,
            max_requests,
            window_seconds,
        }
    }

    fn key(identifier: &str) -> String {
        format!("{RATE_LIMIT_PREFIX}{}", sanitize_key(identifier))
    }

    /// Whether the identifier may proceed.
    ///
    /// Fails open: a store failure logs and admits the request, trading
    /// strictness for availability on the ingestion path.
    pub async fn allow(&self, identifier: &str) -> bool {
        let key = Self::key(identifier);
        let now = timestamp_seconds();
        let window_start = now - self.window_seconds as f64;
        let member = format!("{now:.6}");

        let mut conn = self.conn.clone();
        let result: Result<(i64,), redis::RedisError> = redis::pipe()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&key)
            .arg(0)
            .arg(window_start)
            .ignore()
            .cmd("ZCARD")
            .arg(&key)
            .cmd("ZADD")
            .arg(&key)
            .arg(now)
            .arg(&member)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(self.window_seconds + 1)
            .ignore()
            .query_async(&mut conn)
            .await;

        match result {
            Ok((count,)) => {
                if count >= i64::from(self.max_requests) {
                    warn!(identifier_count = count, "rate limit exceeded");
                    false
                } else {
                    true
                }
            },
            Err(error) => {
                error!(%error, "rate limiter store error, failing open");
                true
            },
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window_seconds", &self.window_seconds)
            .finish_non_exhaustive()
    }
}

/// Current time as fractional seconds since the epoch.
fn timestamp_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_sanitized() {
        assert_eq!(
            RateLimiter::key("whatsapp:+573000000000"),
            "ratelimit:whatsapp_573000000000"
        );
    }

    #[test]
    fn timestamps_advance() {
        let a = timestamp_seconds();
        let b = timestamp_seconds();
        assert!(b >= a);
        assert!(a > 1_500_000_000.0);
    }
}

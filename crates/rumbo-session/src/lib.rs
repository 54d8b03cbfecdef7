//! Rumbo Session — the shared TTL'd state every dialogue turn leans on.
//!
//! Backed by a single key-value store with sorted-set support:
//!
//! - [`SessionStore`]: per-sender dialogue sessions and the atomic
//!   processing lock that serializes turns.
//! - [`RateLimiter`]: sliding-window admission per sender.
//! - [`LocationIndex`]: latest-wins driver positions in a geospatial set.
//!
//! Failure policy is deliberate and asymmetric: the rate limiter fails open
//! (availability over strictness), the processing lock fails closed (no
//! duplicate processing, ever).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod geo;
pub mod rate_limit;
pub mod session;
pub mod store;

pub use error::SessionStoreError;
pub use geo::LocationIndex;
pub use rate_limit::RateLimiter;
pub use session::UserSession;
pub use store::SessionStore;

/// Make a chat sender id safe for use inside a store key.
///
/// `whatsapp:+573001234567` → `whatsapp_573001234567`.
#[must_use]
pub fn sanitize_key(raw: &str) -> String {
    raw.replace(':', "_").replace('+', "")
}

#[cfg(test)]
mod tests {
    use super::sanitize_key;

    #[test]
    fn sanitize_strips_prefix_characters() {
        assert_eq!(sanitize_key("whatsapp:+573001234567"), "whatsapp_573001234567");
        assert_eq!(sanitize_key("plain"), "plain");
    }
}

//! Session persistence and the per-sender processing lock.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, error, warn};

use crate::error::SessionStoreError;
use crate::sanitize_key;
use crate::session::UserSession;

const SESSION_PREFIX: &str = "session:";
const LOCK_PREFIX: &str = "processing_lock:";

/// Session TTL in seconds.
pub const SESSION_TTL_SECONDS: u64 = 3600;

/// Safety TTL on the processing lock, so a crashed worker can never wedge a
/// sender forever.
pub const PROCESSING_LOCK_TTL_SECONDS: u64 = 300;

/// Per-sender session state and processing locks.
#[derive(Clone)]
pub struct SessionStore {
    conn: ConnectionManager,
}

impl SessionStore {
    /// Connect to the store at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Store`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Share the underlying connection (for the rate limiter / geo index).
    #[must_use]
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    fn session_key(sender: &str) -> String {
        format!("{SESSION_PREFIX}{}", sanitize_key(sender))
    }

    fn lock_key(sender: &str) -> String {
        format!("{LOCK_PREFIX}{}", sanitize_key(sender))
    }

    /// Load the sender's session, creating an empty one if absent.
    ///
    /// A corrupt stored value is replaced by a fresh session rather than
    /// failing the turn.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Store`] on a store failure.
    pub async fn get_session(&self, sender: &str) -> Result<UserSession, SessionStoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::session_key(sender)).await?;

        match raw {
            None => Ok(UserSession::new()),
            Some(json) => match serde_json::from_str(&json) {
                Ok(session) => Ok(session),
                Err(parse_error) => {
                    warn!(%parse_error, "corrupted session data, creating new session");
                    Ok(UserSession::new())
                },
            },
        }
    }

    /// Persist the sender's session with a refreshed TTL.
    ///
    /// `last_seen` is stamped here so every save marks the sender as seen.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError`] on store or serialization failure.
    pub async fn save_session(
        &self,
        sender: &str,
        session: &mut UserSession,
    ) -> Result<(), SessionStoreError> {
        session.last_seen = chrono::Utc::now();
        let json = serde_json::to_string(session)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(Self::session_key(sender), json, SESSION_TTL_SECONDS)
            .await?;
        Ok(())
    }

    /// Try to take the processing lock for a sender.
    ///
    /// Atomic set-if-absent with a safety expiry. This is the serialization
    /// point for dialogue turns: at most one turn per sender holds it.
    /// Store failures are treated as "not acquired" (fail closed).
    pub async fn try_acquire_processing(&self, sender: &str) -> bool {
        let mut conn = self.conn.clone();
        let result: Result<Option<String>, redis::RedisError> = redis::cmd("SET")
            .arg(Self::lock_key(sender))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(PROCESSING_LOCK_TTL_SECONDS)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(Some(_)) => true,
            Ok(None) => {
                debug!("processing lock already held");
                false
            },
            Err(error) => {
                error!(%error, "error acquiring processing lock");
                false
            },
        }
    }

    /// Release the sender's processing lock.
    pub async fn release_processing(&self, sender: &str) {
        let mut conn = self.conn.clone();
        if let Err(error) = conn.del::<_, ()>(Self::lock_key(sender)).await {
            error!(%error, "error releasing processing lock");
        }
    }

    /// Whether the store is reachable (used by health endpoints).
    pub async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        assert_eq!(
            SessionStore::session_key("whatsapp:+573001234567"),
            "session:whatsapp_573001234567"
        );
        assert_eq!(
            SessionStore::lock_key("whatsapp:+573001234567"),
            "processing_lock:whatsapp_573001234567"
        );
    }
}

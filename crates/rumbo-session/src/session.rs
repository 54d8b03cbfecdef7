//! The per-sender dialogue session value.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long since `last_seen` before a returning sender gets a welcome.
pub const WELCOME_TIMEOUT_MINUTES: i64 = 20;

/// Dialogue state for one chat sender.
///
/// Stored as JSON under `session:<sender>` with a one-hour TTL; destroyed by
/// TTL expiry or an explicit clear after order confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    /// Last time this sender was heard from.
    pub last_seen: DateTime<Utc>,
    /// Partially filled order fields, keyed by extraction field name.
    #[serde(default)]
    pub current_order_data: BTreeMap<String, String>,
    /// Whether the dialogue is waiting for the sender to fill missing slots.
    #[serde(default)]
    pub awaiting_more_info: bool,
    /// Mirror of the processing-lock state, for observability only; the
    /// lock itself is a separate store key.
    #[serde(default)]
    pub is_processing: bool,
}

impl UserSession {
    /// A fresh session for a sender seen right now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_seen: Utc::now(),
            current_order_data: BTreeMap::new(),
            awaiting_more_info: false,
            is_processing: false,
        }
    }

    /// Whether a welcome message is due.
    ///
    /// Only when there is no order in progress and the sender has been
    /// silent longer than the welcome timeout.
    #[must_use]
    pub fn should_send_welcome(&self, now: DateTime<Utc>) -> bool {
        if !self.current_order_data.is_empty() || self.awaiting_more_info {
            return false;
        }
        now - self.last_seen > Duration::minutes(WELCOME_TIMEOUT_MINUTES)
    }

    /// Drop all order state after confirmation or reset.
    pub fn clear_order(&mut self) {
        self.current_order_data.clear();
        self.awaiting_more_info = false;
    }
}

impl Default for UserSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_gets_no_welcome() {
        let session = UserSession::new();
        assert!(!session.should_send_welcome(Utc::now()));
    }

    #[test]
    fn stale_session_gets_welcome() {
        let mut session = UserSession::new();
        session.last_seen = Utc::now() - Duration::minutes(WELCOME_TIMEOUT_MINUTES + 1);
        assert!(session.should_send_welcome(Utc::now()));
    }

    #[test]
    fn active_order_suppresses_welcome() {
        let mut session = UserSession::new();
        session.last_seen = Utc::now() - Duration::minutes(45);
        session
            .current_order_data
            .insert("tipo_servicio".to_string(), "mototaxi".to_string());
        assert!(!session.should_send_welcome(Utc::now()));
    }

    #[test]
    fn awaiting_info_suppresses_welcome() {
        let mut session = UserSession::new();
        session.last_seen = Utc::now() - Duration::minutes(45);
        session.awaiting_more_info = true;
        assert!(!session.should_send_welcome(Utc::now()));
    }

    #[test]
    fn clear_order_resets_state() {
        let mut session = UserSession::new();
        session
            .current_order_data
            .insert("destino".to_string(), "calle 5".to_string());
        session.awaiting_more_info = true;

        session.clear_order();
        assert!(session.current_order_data.is_empty());
        assert!(!session.awaiting_more_info);
    }

    #[test]
    fn deserializes_with_missing_optional_fields() {
        let session: UserSession =
            serde_json::from_str(r#"{"last_seen": "2026-08-01T12:00:00Z"}"#).unwrap();
        assert!(session.current_order_data.is_empty());
        assert!(!session.awaiting_more_info);
    }
}

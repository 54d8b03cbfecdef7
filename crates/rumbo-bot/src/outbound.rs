//! The outbound chat-send effect.
//!
//! The provider API is an external collaborator reduced to one boolean
//! effect: `send(to, body)`. Bodies are sanitized (trimmed, truncated to
//! the provider's 1600-character limit) before leaving the process.

use async_trait::async_trait;
use tracing::{error, warn};

/// Provider hard limit on message bodies.
pub const MAX_MESSAGE_LENGTH: usize = 1600;

/// Trim and truncate a message body for the provider.
#[must_use]
pub fn sanitize_message(body: &str) -> String {
    body.trim().chars().take(MAX_MESSAGE_LENGTH).collect()
}

/// The chat-send seam.
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Send `body` to `to`. Returns whether the provider accepted it;
    /// failures are logged, never propagated — notifications are
    /// best-effort.
    async fn send(&self, to: &str, body: &str) -> bool;
}

/// REST client for the chat provider's message API.
pub struct ChatApiClient {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl ChatApiClient {
    /// Build the client from provider credentials.
    #[must_use]
    pub fn new(
        api_base: String,
        account_sid: String,
        auth_token: String,
        from_number: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            account_sid,
            auth_token,
            from_number,
        }
    }
}

#[async_trait]
impl ChatSender for ChatApiClient {
    async fn send(&self, to: &str, body: &str) -> bool {
        if to.is_empty() || body.is_empty() {
            error!("missing recipient or body, message not sent");
            return false;
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let sanitized = sanitize_message(body);
        let form = [
            ("From", self.from_number.as_str()),
            ("To", to),
            ("Body", sanitized.as_str()),
        ];

        match self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "chat provider rejected the message");
                false
            },
            Err(send_error) => {
                error!(%send_error, "error sending chat message");
                false
            },
        }
    }
}

impl std::fmt::Debug for ChatApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatApiClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_and_truncates() {
        assert_eq!(sanitize_message("  hola  "), "hola");
        let long = "a".repeat(2000);
        assert_eq!(sanitize_message(&long).len(), MAX_MESSAGE_LENGTH);
        assert_eq!(sanitize_message(""), "");
    }
}

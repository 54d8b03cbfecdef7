//! The inbound webhook: validate, enqueue, answer immediately.
//!
//! All heavy work is deferred to the worker; this surface only checks the
//! request (size, signature, rate limit), publishes the message, and
//! returns the provider's empty XML envelope.
//!
//! Status mapping: invalid signature or oversize body → 403, rate limit →
//! 429, broker unavailable → 503, anything unexpected → 500.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, RawForm, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use rumbo_broker::{Broker, topology};
use rumbo_core::IncomingMessage;
use rumbo_session::{RateLimiter, SessionStore};
use tracing::{error, info, warn};

use crate::signature::SignatureValidator;

/// Signature header sent by the chat provider.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// The provider's empty response envelope.
const EMPTY_ENVELOPE: &str = "<Response/>";

const MAX_BODY_CHARS: usize = 2000;

/// Shared webhook state.
#[derive(Clone)]
pub struct WebhookState {
    /// Session store (health checks).
    pub store: SessionStore,
    /// Per-sender rate limiter.
    pub limiter: RateLimiter,
    /// Broker handle for enqueueing.
    pub broker: Arc<Broker>,
    /// Provider signature validator.
    pub validator: SignatureValidator,
    /// Public webhook URL, as signed by the provider.
    pub public_url: String,
    /// Request body cap.
    pub max_request_bytes: u64,
}

impl std::fmt::Debug for WebhookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookState").finish_non_exhaustive()
    }
}

/// Build the webhook router.
pub fn router(state: WebhookState) -> Router {
    let limit = usize::try_from(state.max_request_bytes).unwrap_or(usize::MAX);
    Router::new()
        .route("/webhook", post(webhook))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            enforce_size_limit,
        ))
        .layer(DefaultBodyLimit::max(limit))
        .route("/health", get(health))
        .with_state(state)
}

/// Reject oversize requests before their body is ever read.
async fn enforce_size_limit(
    State(state): State<WebhookState>,
    request: Request,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);

    if declared > state.max_request_bytes {
        warn!(declared, limit = state.max_request_bytes, "request too large");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    next.run(request).await
}

fn xml_envelope(status: StatusCode) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/xml")],
        EMPTY_ENVELOPE,
    )
        .into_response()
}

async fn webhook(
    State(state): State<WebhookState>,
    headers: axum::http::HeaderMap,
    RawForm(body): RawForm,
) -> Response {
    let params = parse_form(&body);

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !state.validator.validate(&state.public_url, &params, signature) {
        warn!("invalid webhook signature rejected");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let sender = params.get("From").cloned().unwrap_or_default();
    let rate_key = if sender.is_empty() { "unknown" } else { sender.as_str() };
    if !state.limiter.allow(rate_key).await {
        warn!("rate limit exceeded");
        return xml_envelope(StatusCode::TOO_MANY_REQUESTS);
    }

    let message = build_message(&params);
    let Some(message) = message else {
        // No sender: nothing to process, but the provider gets its 200.
        return xml_envelope(StatusCode::OK);
    };

    match state
        .broker
        .publish_json(&topology::INCOMING_MESSAGES, &message)
        .await
    {
        Ok(()) => {
            info!("message enqueued for processing");
            xml_envelope(StatusCode::OK)
        },
        Err(publish_error) => {
            error!(%publish_error, "failed to enqueue message");
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
        },
    }
}

async fn health(State(state): State<WebhookState>) -> Response {
    if state.store.health_check().await {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Unhealthy").into_response()
    }
}

fn parse_form(body: &Bytes) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Validate and shape the provider payload. `None` when the sender is
/// missing (the message is dropped, not an error).
fn build_message(params: &BTreeMap<String, String>) -> Option<IncomingMessage> {
    let sender = params.get("From")?.trim();
    if sender.is_empty() {
        return None;
    }

    let num_media: u32 = params
        .get("NumMedia")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0);

    let message_body = params
        .get("Body")
        .map(|body| body.trim().chars().take(MAX_BODY_CHARS).collect::<String>())
        .filter(|body| !body.is_empty());

    Some(IncomingMessage {
        sender_number: sender.to_string(),
        profile_name: params.get("ProfileName").cloned(),
        message_body,
        num_media,
        media_url: (num_media > 0)
            .then(|| params.get("MediaUrl0").cloned())
            .flatten(),
        media_content_type: (num_media > 0)
            .then(|| params.get("MediaContentType0").cloned())
            .flatten(),
        received_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn message_requires_a_sender() {
        assert!(build_message(&params(&[("Body", "hola")])).is_none());
        assert!(build_message(&params(&[("From", "   "), ("Body", "hola")])).is_none());
    }

    #[test]
    fn body_is_trimmed_and_capped() {
        let long = format!("  {}  ", "m".repeat(3000));
        let message = build_message(&params(&[
            ("From", "whatsapp:+573001234567"),
            ("Body", long.as_str()),
        ]))
        .unwrap();
        assert_eq!(message.message_body.unwrap().chars().count(), MAX_BODY_CHARS);
    }

    #[test]
    fn media_fields_only_carry_when_media_is_present() {
        let with_media = build_message(&params(&[
            ("From", "whatsapp:+573001234567"),
            ("NumMedia", "1"),
            ("MediaUrl0", "https://media.example/audio"),
            ("MediaContentType0", "audio/ogg"),
        ]))
        .unwrap();
        assert_eq!(with_media.num_media, 1);
        assert!(with_media.media_url.is_some());

        let without_media = build_message(&params(&[
            ("From", "whatsapp:+573001234567"),
            ("NumMedia", "0"),
            ("MediaUrl0", "https://media.example/stale"),
        ]))
        .unwrap();
        assert!(without_media.media_url.is_none());
    }

    #[test]
    fn garbage_num_media_defaults_to_zero() {
        let message = build_message(&params(&[
            ("From", "whatsapp:+573001234567"),
            ("NumMedia", "many"),
            ("Body", "hola"),
        ]))
        .unwrap();
        assert_eq!(message.num_media, 0);
    }

    #[test]
    fn form_parsing_handles_urlencoding() {
        let body = Bytes::from_static(b"From=whatsapp%3A%2B573001234567&Body=necesito+mototaxi");
        let parsed = parse_form(&body);
        assert_eq!(
            parsed.get("From").map(String::as_str),
            Some("whatsapp:+573001234567")
        );
        assert_eq!(parsed.get("Body").map(String::as_str), Some("necesito mototaxi"));
    }
}

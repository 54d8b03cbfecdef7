//! The speech-to-text collaborator.
//!
//! Transcription shares the bounded heavy-work pool with extraction so a
//! burst of voice notes cannot starve the runtime.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Transcription failure.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// The HTTP call failed or timed out.
    #[error("transcription transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The audio file could not be read.
    #[error("cannot read audio file: {0}")]
    Io(#[from] std::io::Error),

    /// The service answered with an unexpected payload.
    #[error("transcription returned invalid payload: {0}")]
    InvalidPayload(String),
}

/// The transcription seam.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file.
    ///
    /// Returns `None` for unintelligible audio (the service heard nothing).
    ///
    /// # Errors
    ///
    /// Returns [`TranscribeError`] when the collaborator fails.
    async fn transcribe(&self, audio_path: &Path) -> Result<Option<String>, TranscribeError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP client for the speech-to-text service.
pub struct HttpTranscriber {
    http: reqwest::Client,
    url: String,
    api_key: String,
    permits: Arc<Semaphore>,
}

impl HttpTranscriber {
    /// Build the client over the shared heavy-work pool.
    #[must_use]
    pub fn new(url: String, api_key: String, permits: Arc<Semaphore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            api_key,
            permits,
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Option<String>, TranscribeError> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            TranscribeError::InvalidPayload("worker pool closed".to_string())
        })?;

        let bytes = tokio::fs::read(audio_path).await?;

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|parse_error| TranscribeError::InvalidPayload(parse_error.to_string()))?;

        Ok(parsed
            .text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }
}

impl std::fmt::Debug for HttpTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTranscriber")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn transcriber_for(server: &MockServer) -> HttpTranscriber {
        HttpTranscriber::new(
            server.uri(),
            "key".to_string(),
            Arc::new(Semaphore::new(2)),
        )
    }

    #[tokio::test]
    async fn returns_trimmed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "  necesito un mototaxi  "
            })))
            .mount(&server)
            .await;

        let file = tempfile::NamedTempFile::new().unwrap();
        let result = transcriber_for(&server)
            .await
            .transcribe(file.path())
            .await
            .unwrap();
        assert_eq!(result.as_deref(), Some("necesito un mototaxi"));
    }

    #[tokio::test]
    async fn empty_transcript_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "   " })),
            )
            .mount(&server)
            .await;

        let file = tempfile::NamedTempFile::new().unwrap();
        let result = transcriber_for(&server)
            .await
            .transcribe(file.path())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}

//! Audio media validation and download.
//!
//! Two lines of defense before a byte of audio is transcribed: a HEAD
//! request checks the declared size, then the streaming download keeps a
//! running byte counter and aborts the moment it crosses the cap — a lying
//! `Content-Length` doesn't help an attacker. Files land in temp files that
//! delete themselves on drop.

use futures::StreamExt;
use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// MIME types accepted for voice notes.
pub const ALLOWED_AUDIO_TYPES: [&str; 6] = [
    "audio/ogg",
    "audio/mpeg",
    "audio/mp4",
    "audio/wav",
    "audio/webm",
    "audio/amr",
];

const HEAD_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Audio pipeline failure.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The attachment is not an accepted audio type.
    #[error("unsupported audio type: {0}")]
    InvalidMimeType(String),

    /// The audio exceeds the size cap (declared or measured).
    #[error("audio size {size} exceeds limit of {limit} bytes")]
    SizeLimitExceeded {
        /// Bytes declared or downloaded so far.
        size: u64,
        /// The configured cap.
        limit: u64,
    },

    /// Download transport failure.
    #[error("audio transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local file failure.
    #[error("audio io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads provider-hosted audio attachments under a hard size cap.
pub struct AudioFetcher {
    http: reqwest::Client,
    max_bytes: u64,
    auth_user: String,
    auth_password: String,
}

impl AudioFetcher {
    /// Build a fetcher. Media URLs require the provider account
    /// credentials as basic auth.
    #[must_use]
    pub fn new(max_bytes: u64, auth_user: String, auth_password: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            max_bytes,
            auth_user,
            auth_password,
        }
    }

    /// Whether a MIME type is an accepted audio type.
    #[must_use]
    pub fn is_allowed_type(content_type: &str) -> bool {
        ALLOWED_AUDIO_TYPES
            .iter()
            .any(|allowed| content_type.starts_with(allowed))
    }

    /// Validate and download an audio attachment into a temp file.
    ///
    /// Checks the MIME type, HEAD-checks the declared size, then streams
    /// the body with a running counter that aborts mid-download on
    /// overflow. The temp file is deleted when the handle drops.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError`] for type, size and transport failures.
    pub async fn download(
        &self,
        media_url: &str,
        content_type: &str,
    ) -> Result<NamedTempFile, AudioError> {
        if !Self::is_allowed_type(content_type) {
            return Err(AudioError::InvalidMimeType(content_type.to_string()));
        }

        let head = self
            .http
            .head(media_url)
            .basic_auth(&self.auth_user, Some(&self.auth_password))
            .timeout(HEAD_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let declared = head
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        if declared > self.max_bytes {
            return Err(AudioError::SizeLimitExceeded {
                size: declared,
                limit: self.max_bytes,
            });
        }

        let response = self
            .http
            .get(media_url)
            .basic_auth(&self.auth_user, Some(&self.auth_password))
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let mut file = NamedTempFile::new()?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            downloaded += chunk.len() as u64;
            if downloaded > self.max_bytes {
                // Temp file is removed when `file` drops here.
                return Err(AudioError::SizeLimitExceeded {
                    size: downloaded,
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk)?;
        }

        file.flush()?;
        debug!(bytes = downloaded, "audio downloaded");
        Ok(file)
    }
}

impl std::fmt::Debug for AudioFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFetcher")
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(max_bytes: u64) -> AudioFetcher {
        AudioFetcher::new(max_bytes, "sid".to_string(), "token".to_string())
    }

    #[test]
    fn mime_allowlist() {
        assert!(AudioFetcher::is_allowed_type("audio/ogg"));
        assert!(AudioFetcher::is_allowed_type("audio/ogg; codecs=opus"));
        assert!(AudioFetcher::is_allowed_type("audio/amr"));
        assert!(!AudioFetcher::is_allowed_type("image/jpeg"));
        assert!(!AudioFetcher::is_allowed_type("video/mp4"));
    }

    #[tokio::test]
    async fn rejects_non_audio_before_any_request() {
        let result = fetcher(1024).download("http://localhost:0/media", "image/png").await;
        assert!(matches!(result, Err(AudioError::InvalidMimeType(_))));
    }

    #[tokio::test]
    async fn downloads_audio_at_exactly_the_limit() {
        let body = vec![0_u8; 1024];
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "1024"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let file = fetcher(1024)
            .download(&format!("{}/media", server.uri()), "audio/ogg")
            .await
            .unwrap();
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn rejects_oversize_at_head_check() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "2048"))
            .mount(&server)
            .await;

        let result = fetcher(1024)
            .download(&format!("{}/media", server.uri()), "audio/ogg")
            .await;
        assert!(matches!(
            result,
            Err(AudioError::SizeLimitExceeded { size: 2048, limit: 1024 })
        ));
    }

    #[tokio::test]
    async fn aborts_mid_stream_when_body_lies_about_its_size() {
        // HEAD declares a size under the cap; the body is one byte over.
        let body = vec![0_u8; 1025];
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "512"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let result = fetcher(1024)
            .download(&format!("{}/media", server.uri()), "audio/ogg")
            .await;
        assert!(matches!(
            result,
            Err(AudioError::SizeLimitExceeded { limit: 1024, .. })
        ));
    }
}

//! The field-extraction collaborator: free text in, partial order out.
//!
//! The external service runs a language model in JSON mode; this module
//! treats it as a function `extract(text) → partial order`. The HTTP
//! contract: `POST {url}` with a bearer key and `{"prompt": …}`; the
//! response body is the extracted-field JSON object itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

/// Extraction failure.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The HTTP call failed or timed out.
    #[error("extraction transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with something other than the field JSON.
    #[error("extraction returned invalid payload: {0}")]
    InvalidPayload(String),

    /// Nothing to analyze.
    #[error("empty message provided")]
    EmptyInput,
}

/// Fields the extractor may find in a message. All optional; absent fields
/// are simply not mentioned by the sender yet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedFields {
    /// Service type, free-form (normalized downstream).
    #[serde(default)]
    pub tipo_servicio: Option<String>,
    /// Pickup description.
    #[serde(default)]
    pub origen: Option<String>,
    /// Drop-off description.
    #[serde(default)]
    pub destino: Option<String>,
    /// The sender's name.
    #[serde(default)]
    pub nombre_usuario: Option<String>,
    /// A contact phone, when dictated.
    #[serde(default)]
    pub telefono: Option<String>,
    /// Payment method.
    #[serde(default)]
    pub metodo_pago: Option<String>,
    /// Amount, free-form.
    #[serde(default)]
    pub monto: Option<String>,
    /// Everything else relevant to the order.
    #[serde(default)]
    pub detalles_adicionales: Option<String>,
}

/// The extraction seam.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract order fields from a message.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the collaborator fails; the dialogue
    /// replies with an error message and preserves the session.
    async fn extract(&self, text: &str) -> Result<ExtractedFields, ExtractError>;
}

const EXTRACTION_PROMPT: &str = "Extrae la siguiente información del mensaje del usuario.

Campos a extraer:
- \"tipo_servicio\": (\"mototaxi\", \"compras\", \"domicilio\", o \"otro\")
- \"origen\": dirección de inicio
- \"destino\": dirección de destino
- \"nombre_usuario\": nombre del cliente
- \"telefono\": teléfono de contacto
- \"metodo_pago\": (\"efectivo\", \"transferencia\", \"nequi\", \"daviplata\", \"otro\")
- \"monto\": valor del servicio
- \"detalles_adicionales\": información extra del pedido

Responde SOLO con JSON válido. Si un campo no está presente, omítelo o usa null.

Mensaje del usuario:
";

const MAX_INPUT_CHARS: usize = 2000;

/// HTTP client for the extraction service.
pub struct HttpExtractor {
    http: reqwest::Client,
    url: String,
    api_key: String,
    permits: Arc<Semaphore>,
}

impl HttpExtractor {
    /// Build the client. `permits` bounds concurrent extractions (the
    /// shared heavy-work pool).
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
impl Extractor for HttpExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractedFields, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::EmptyInput);
        }

        let _permit = self.permits.acquire().await.map_err(|_| {
            ExtractError::InvalidPayload("worker pool closed".to_string())
        })?;

        let truncated: String = text.chars().take(MAX_INPUT_CHARS).collect();
        let prompt = format!("{EXTRACTION_PROMPT}{truncated}");

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|parse_error| {
            warn!(%parse_error, "extractor returned non-JSON payload");
            ExtractError::InvalidPayload(parse_error.to_string())
        })
    }
}

impl std::fmt::Debug for HttpExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExtractor")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_extracted_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tipo_servicio": "mototaxi",
                "origen": "parque",
                "destino": "hospital",
                "nombre_usuario": "Juan",
                "metodo_pago": "efectivo"
            })))
            .mount(&server)
            .await;

        let extractor = HttpExtractor::new(
            format!("{}/extract", server.uri()),
            "key".to_string(),
            Arc::new(Semaphore::new(2)),
        );

        let fields = extractor
            .extract("necesito mototaxi del parque al hospital, pago efectivo, soy Juan")
            .await
            .unwrap();
        assert_eq!(fields.tipo_servicio.as_deref(), Some("mototaxi"));
        assert_eq!(fields.origen.as_deref(), Some("parque"));
        assert_eq!(fields.destino.as_deref(), Some("hospital"));
        assert_eq!(fields.nombre_usuario.as_deref(), Some("Juan"));
        assert!(fields.monto.is_none());
    }

    #[tokio::test]
    async fn rejects_empty_input() {
        let extractor = HttpExtractor::new(
            "http://localhost:0/extract".to_string(),
            "key".to_string(),
            Arc::new(Semaphore::new(2)),
        );
        assert!(matches!(
            extractor.extract("   ").await,
            Err(ExtractError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn non_json_payload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("lo siento, no puedo"))
            .mount(&server)
            .await;

        let extractor = HttpExtractor::new(
            server.uri(),
            "key".to_string(),
            Arc::new(Semaphore::new(2)),
        );
        assert!(matches!(
            extractor.extract("hola").await,
            Err(ExtractError::InvalidPayload(_))
        ));
    }
}

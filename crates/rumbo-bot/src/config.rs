//! Bot configuration, split by binary.
//!
//! The webhook and the worker need different slices of the environment, so
//! each loads its own struct and startup refuses to run with anything
//! missing (exit code 1 at the binary).

use std::env;

use rumbo_broker::BrokerConfig;
use thiserror::Error;

/// A required environment variable is missing.
#[derive(Debug, Error)]
#[error("missing required environment variable: {0}")]
pub struct ConfigError(pub &'static str);

/// Default cap on inbound webhook bodies.
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 10 * 1024 * 1024;

/// Default cap on downloaded audio, in megabytes.
pub const DEFAULT_MAX_AUDIO_MB: u64 = 10;

/// Settings for the webhook binary.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared secret for the provider signature check. Required: the
    /// webhook refuses to run without signature validation.
    pub provider_secret: String,
    /// Public URL of the webhook, as signed by the provider.
    pub public_url: String,
    /// Session-store URL.
    pub redis_url: String,
    /// Broker connection settings.
    pub broker: BrokerConfig,
    /// HTTP listen address.
    pub listen_addr: String,
    /// Maximum accepted request body size.
    pub max_request_bytes: u64,
    /// Rate limit: requests allowed per window.
    pub rate_limit_requests: u32,
    /// Rate limit: window length in seconds.
    pub rate_limit_window_seconds: u64,
}

impl WebhookConfig {
    /// Read the webhook configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider_secret =
            env::var("CHAT_PROVIDER_AUTH_TOKEN").map_err(|_| ConfigError("CHAT_PROVIDER_AUTH_TOKEN"))?;
        let public_url =
            env::var("WEBHOOK_PUBLIC_URL").map_err(|_| ConfigError("WEBHOOK_PUBLIC_URL"))?;
        let redis_url = env::var("REDIS_URL").map_err(|_| ConfigError("REDIS_URL"))?;
        let broker = BrokerConfig::from_env().map_err(ConfigError)?;
        let listen_addr =
            env::var("BOT_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        Ok(Self {
            provider_secret,
            public_url,
            redis_url,
            broker,
            listen_addr,
            max_request_bytes: int_env("MAX_REQUEST_SIZE_BYTES", DEFAULT_MAX_REQUEST_BYTES),
            rate_limit_requests: int_env("RATE_LIMIT_REQUESTS", 30),
            rate_limit_window_seconds: int_env("RATE_LIMIT_WINDOW_SECONDS", 60),
        })
    }
}

/// Settings for the worker binary.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Session-store URL.
    pub redis_url: String,
    /// Broker connection settings.
    pub broker: BrokerConfig,
    /// Field-extraction service endpoint.
    pub extractor_url: String,
    /// Field-extraction service API key.
    pub extractor_api_key: String,
    /// Speech-to-text service endpoint.
    pub stt_url: String,
    /// Speech-to-text service API key.
    pub stt_api_key: String,
    /// Chat provider account id (also media-download auth).
    pub chat_account_sid: String,
    /// Chat provider auth token.
    pub chat_auth_token: String,
    /// Chat provider sender number.
    pub chat_from_number: String,
    /// Chat provider API base URL.
    pub chat_api_base: String,
    /// Maximum audio size in megabytes.
    pub max_audio_mb: u64,
}

impl WorkerConfig {
    /// Read the worker configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let redis_url = env::var("REDIS_URL").map_err(|_| ConfigError("REDIS_URL"))?;
        let broker = BrokerConfig::from_env().map_err(ConfigError)?;
        let extractor_url =
            env::var("EXTRACTOR_API_URL").map_err(|_| ConfigError("EXTRACTOR_API_URL"))?;
        let extractor_api_key =
            env::var("EXTRACTOR_API_KEY").map_err(|_| ConfigError("EXTRACTOR_API_KEY"))?;
        let stt_url = env::var("STT_API_URL").map_err(|_| ConfigError("STT_API_URL"))?;
        let stt_api_key = env::var("STT_API_KEY").map_err(|_| ConfigError("STT_API_KEY"))?;
        let chat_account_sid =
            env::var("CHAT_PROVIDER_ACCOUNT_SID").map_err(|_| ConfigError("CHAT_PROVIDER_ACCOUNT_SID"))?;
        let chat_auth_token =
            env::var("CHAT_PROVIDER_AUTH_TOKEN").map_err(|_| ConfigError("CHAT_PROVIDER_AUTH_TOKEN"))?;
        let chat_from_number =
            env::var("CHAT_PROVIDER_FROM_NUMBER").map_err(|_| ConfigError("CHAT_PROVIDER_FROM_NUMBER"))?;
        let chat_api_base = env::var("CHAT_PROVIDER_API_BASE")
            .unwrap_or_else(|_| "https://api.chat-provider.example".to_string());
        Ok(Self {
            redis_url,
            broker,
            extractor_url,
            extractor_api_key,
            stt_url,
            stt_api_key,
            chat_account_sid,
            chat_auth_token,
            chat_from_number,
            chat_api_base,
            max_audio_mb: int_env("MAX_AUDIO_SIZE_MB", DEFAULT_MAX_AUDIO_MB),
        })
    }

    /// Audio size cap in bytes.
    #[must_use]
    pub fn max_audio_bytes(&self) -> u64 {
        self.max_audio_mb * 1024 * 1024
    }
}

fn int_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

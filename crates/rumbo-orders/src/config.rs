//! Orders service configuration.

use std::env;

use rumbo_broker::BrokerConfig;
use thiserror::Error;

/// A required environment variable is missing.
#[derive(Debug, Error)]
#[error("missing required environment variable: {0}")]
pub struct ConfigError(pub &'static str);

/// Environment-driven settings for the orders service.
#[derive(Debug, Clone)]
pub struct OrdersConfig {
    /// Postgres connection URL.
    pub database_url: String,
    /// Secret for verifying bearer tokens.
    pub jwt_secret: String,
    /// Broker connection settings.
    pub broker: BrokerConfig,
    /// HTTP listen address.
    pub listen_addr: String,
}

impl OrdersConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing required variable;
    /// the binary maps this to exit code 1.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("PEDIDOS_DATABASE_URL").map_err(|_| ConfigError("PEDIDOS_DATABASE_URL"))?;
        let jwt_secret = env::var("JWT_SECRET_KEY").map_err(|_| ConfigError("JWT_SECRET_KEY"))?;
        let broker = BrokerConfig::from_env().map_err(ConfigError)?;
        let listen_addr =
            env::var("PEDIDOS_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:5003".to_string());
        Ok(Self {
            database_url,
            jwt_secret,
            broker,
            listen_addr,
        })
    }
}

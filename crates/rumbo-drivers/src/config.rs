//! Driver service configuration.

use std::env;

use rumbo_broker::BrokerConfig;
use thiserror::Error;

/// A required environment variable is missing.
#[derive(Debug, Error)]
#[error("missing required environment variable: {0}")]
pub struct ConfigError(pub &'static str);

/// Environment-driven settings for the driver service.
#[derive(Debug, Clone)]
pub struct DriversConfig {
    /// Postgres connection URL.
    pub database_url: String,
    /// Session-store URL (location index).
    pub redis_url: String,
    /// Secret for verifying driver bearer tokens.
    pub jwt_secret: String,
    /// Broker connection settings.
    pub broker: BrokerConfig,
    /// HTTP listen address.
    pub listen_addr: String,
    /// Maximum candidates notified per dispatch event.
    pub dispatch_cap: i64,
    /// Seconds an unconfirmed `en_servicio` driver may linger before the
    /// watchdog flips them back to `disponible`.
    pub assignment_grace_secs: u64,
    /// Seconds between watchdog sweeps.
    pub watchdog_interval_secs: u64,
    /// Key of the geospatial location set.
    pub locations_key: String,
}

impl DriversConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first missing required variable;
    /// the binary maps this to exit code 1.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("MOTOTAXIS_DATABASE_URL")
            .map_err(|_| ConfigError("MOTOTAXIS_DATABASE_URL"))?;
        let redis_url = env::var("REDIS_URL").map_err(|_| ConfigError("REDIS_URL"))?;
        let jwt_secret = env::var("JWT_SECRET_KEY_MOTOTAXIS")
            .map_err(|_| ConfigError("JWT_SECRET_KEY_MOTOTAXIS"))?;
        let broker = BrokerConfig::from_env().map_err(ConfigError)?;
        let listen_addr =
            env::var("MOTOTAXIS_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:5001".to_string());
        let dispatch_cap = int_env("DISPATCH_CANDIDATE_CAP", 1000);
        let assignment_grace_secs = int_env("ASSIGNMENT_GRACE_SECS", 180);
        let watchdog_interval_secs = int_env("WATCHDOG_INTERVAL_SECS", 30);
        let locations_key = env::var("REDIS_DRIVER_LOCATIONS_KEY")
            .unwrap_or_else(|_| rumbo_session::geo::DEFAULT_GEO_KEY.to_string());
        Ok(Self {
            database_url,
            redis_url,
            jwt_secret,
            broker,
            listen_addr,
            dispatch_cap,
            assignment_grace_secs,
            watchdog_interval_secs,
            locations_key,
        })
    }
}

fn int_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

//! Broker error types.

use thiserror::Error;

/// Errors surfaced by broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The AMQP connection could not be established.
    #[error("broker connect failed after {attempts} attempts: {source}")]
    Connect {
        /// How many attempts were made.
        attempts: u32,
        /// The last underlying error.
        source: lapin::Error,
    },

    /// An AMQP operation failed on an established connection.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// A payload could not be serialized to JSON.
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

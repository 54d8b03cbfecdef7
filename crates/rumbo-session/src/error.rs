//! Session store error types.

use thiserror::Error;

/// Errors from the session/cache store.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// The underlying store operation failed.
    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    /// A stored session could not be encoded.
    #[error("session serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

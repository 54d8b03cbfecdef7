//! Orders service error types.

use rumbo_core::OrderStatus;
use thiserror::Error;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrdersError {
    /// No order with the given id.
    #[error("order not found")]
    NotFound,

    /// The requested state change is not an edge of the transition matrix.
    #[error("transition from '{from}' to '{to}' not allowed")]
    TransitionForbidden {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// Someone else changed the order between read and write.
    #[error("order was modified concurrently")]
    ConcurrentModification,

    /// The status filter is not a valid status token.
    #[error("invalid order status: {0}")]
    InvalidStatus(String),

    /// Database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Broker failure while emitting an event.
    #[error("broker error: {0}")]
    Broker(#[from] rumbo_broker::BrokerError),
}

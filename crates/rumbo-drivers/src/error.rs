//! Driver service error types.

use thiserror::Error;

use crate::models::Availability;

/// Errors from driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Unknown driver id.
    #[error("conductor no encontrado")]
    NotFound,

    /// The driver account is inactive or not validated.
    #[error("tu cuenta no está activa o validada para tomar servicios")]
    NotEligible,

    /// The driver is not `disponible`.
    #[error("no puedes aceptar servicios, tu estado actual es '{current}'")]
    NotAvailable {
        /// The driver's current availability.
        current: Availability,
    },

    /// The availability compare-and-set failed: the driver was dispatched
    /// elsewhere between the eligibility check and the flip.
    #[error("no disponible: el servicio fue tomado o tu estado cambió")]
    RaceLost,

    /// The accept event could not be published; the availability flip was
    /// compensated.
    #[error("el servicio fue aceptado pero falló la notificación al sistema de pedidos; \
             tu estado ha sido revertido, intenta de nuevo")]
    PublishFailed(#[source] rumbo_broker::BrokerError),

    /// Database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

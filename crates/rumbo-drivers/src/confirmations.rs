//! Assignment-confirmation consumer.
//!
//! The orders service publishes one client-notification event per
//! successful assignment. This service keeps its own binding to that
//! routing key and uses the event to mark the winning driver's acceptance
//! as confirmed — the signal the watchdog distinguishes winners from
//! stranded losers by.

use async_trait::async_trait;
use rumbo_broker::{HandlerError, MessageHandler};
use rumbo_core::ClientNotificationEvent;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::repo;

/// Consumes `cola_confirmaciones_despacho`.
#[derive(Debug)]
pub struct ConfirmationHandler {
    pool: PgPool,
}

impl ConfirmationHandler {
    /// Build the handler.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageHandler for ConfirmationHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        let event: ClientNotificationEvent = serde_json::from_slice(payload)
            .map_err(|error| HandlerError::Malformed(error.to_string()))?;

        let confirmed = repo::confirm_assignment(
            &self.pool,
            event.id_conductor_asignado,
            event.id_pedido,
        )
        .await
        .map_err(|error| HandlerError::Failed(error.to_string()))?;

        if confirmed {
            info!(
                driver_id = %event.id_conductor_asignado,
                order_id = %event.id_pedido,
                "assignment confirmed"
            );
        } else {
            // The driver already moved on (completed, went off shift, or
            // was reset); nothing to confirm.
            debug!(
                driver_id = %event.id_conductor_asignado,
                order_id = %event.id_pedido,
                "no pending assignment matched the confirmation"
            );
        }
        Ok(())
    }
}

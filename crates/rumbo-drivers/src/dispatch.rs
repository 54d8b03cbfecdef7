//! Dispatch fan-out: one broker event, many driver pushes.

use std::sync::Arc;

use async_trait::async_trait;
use rumbo_broker::{HandlerError, MessageHandler};
use rumbo_core::{DispatchEvent, DriverPushMessage};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::registry::PushRegistry;
use crate::repo;

/// Consumes `pedido.requiere_mototaxi` and pushes each event to every
/// candidate driver with a live channel.
///
/// Sends only enqueue onto the per-driver channels — the actual socket
/// writes happen on each connection's writer task, never in this consumer.
/// Drivers without a channel are skipped silently; delivery is best-effort
/// and the single write path remains the acceptance protocol.
pub struct DispatchHandler {
    pool: PgPool,
    registry: Arc<PushRegistry>,
    candidate_cap: i64,
}

impl DispatchHandler {
    /// Build the handler.
    #[must_use]
    pub fn new(pool: PgPool, registry: Arc<PushRegistry>, candidate_cap: i64) -> Self {
        Self {
            pool,
            registry,
            candidate_cap,
        }
    }
}

#[async_trait]
impl MessageHandler for DispatchHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        let event: DispatchEvent = serde_json::from_slice(payload)
            .map_err(|error| HandlerError::Malformed(error.to_string()))?;

        info!(
            order_id = %event.id_pedido,
            tipo_servicio = %event.tipo_servicio,
            origen = event.origen_descripcion.as_deref().unwrap_or("-"),
            "dispatch event received"
        );

        let candidates = repo::candidates(&self.pool, self.candidate_cap)
            .await
            .map_err(|error| HandlerError::Failed(error.to_string()))?;

        if candidates.is_empty() {
            warn!(order_id = %event.id_pedido, "no candidate drivers for dispatch");
            return Ok(());
        }

        let mut delivered = 0_usize;
        for candidate in &candidates {
            let frame = DriverPushMessage::NuevoServicioDisponible {
                data: event.clone(),
            };
            if self.registry.send(candidate.id_conductor, frame) {
                delivered += 1;
            }
        }

        info!(
            order_id = %event.id_pedido,
            candidates = candidates.len(),
            delivered,
            "dispatch fan-out scheduled"
        );
        Ok(())
    }
}

impl std::fmt::Debug for DispatchHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandler")
            .field("candidate_cap", &self.candidate_cap)
            .finish_non_exhaustive()
    }
}

//! The acceptance protocol: first driver to accept wins.
//!
//! The critical section is a single compare-and-set on the driver's
//! availability row; everything after it either completes the acceptance
//! (publish succeeded) or compensates it (publish failed, flip back).

use std::sync::Arc;

use chrono::Utc;
use rumbo_broker::{Broker, topology};
use rumbo_core::{DriverAcceptedEvent, DriverId, OrderId, OrderStatus};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::error::DriverError;
use crate::models::Availability;
use crate::repo;

/// Arbitration of driver acceptances.
#[derive(Clone)]
pub struct AcceptanceService {
    pool: PgPool,
    broker: Arc<Broker>,
}

impl AcceptanceService {
    /// Build the service over its store and broker handles.
    #[must_use]
    pub fn new(pool: PgPool, broker: Arc<Broker>) -> Self {
        Self { pool, broker }
    }

    /// Handle one driver's attempt to accept an order.
    ///
    /// Sequence:
    /// 1. re-verify candidacy (active, validated, `disponible`);
    /// 2. atomically flip availability `disponible → en_servicio`;
    /// 3. publish the accept event;
    /// 4. on publish failure, flip back and report the failure.
    ///
    /// The orders service has the final word: if another driver's event
    /// lands there first, the transition matrix rejects this one and the
    /// watchdog eventually recovers the losing driver.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotFound`] / [`DriverError::NotEligible`] /
    /// [`DriverError::NotAvailable`] for failed candidacy,
    /// [`DriverError::RaceLost`] when the flip loses the race, and
    /// [`DriverError::PublishFailed`] after a compensated broker failure.
    pub async fn accept(&self, driver_id: DriverId, order_id: OrderId) -> Result<(), DriverError> {
        let driver = repo::get_driver(&self.pool, driver_id)
            .await?
            .ok_or(DriverError::NotFound)?;

        if !driver.activo
            || driver.estado_validacion_general != crate::models::ValidationState::Aprobado
        {
            return Err(DriverError::NotEligible);
        }
        if driver.estado_disponibilidad != Availability::Disponible {
            return Err(DriverError::NotAvailable {
                current: driver.estado_disponibilidad,
            });
        }

        if !repo::try_begin_service(&self.pool, driver_id, order_id).await? {
            info!(driver_id = %driver_id, order_id = %order_id, "availability flip lost the race");
            return Err(DriverError::RaceLost);
        }
        info!(driver_id = %driver_id, order_id = %order_id, "driver flipped to en_servicio");

        let plate = repo::active_plate(&self.pool, driver_id).await?;
        if plate.is_none() {
            warn!(driver_id = %driver_id, "driver has no active vehicle with a plate");
        }

        let event = DriverAcceptedEvent {
            id_pedido: order_id,
            id_conductor_que_acepto: driver_id,
            nombre_conductor: Some(driver.nombre_completo.clone()),
            placa_vehiculo_activa: plate,
            timestamp_aceptacion_utc: Utc::now(),
            nuevo_estado_para_pedido: OrderStatus::AsignadoConductor,
        };

        match self
            .broker
            .publish_json(&topology::ORDER_UPDATES, &event)
            .await
        {
            Ok(()) => {
                info!(
                    driver_id = %driver_id,
                    order_id = %order_id,
                    "acceptance published, awaiting assignment confirmation"
                );
                Ok(())
            },
            Err(publish_error) => {
                // Compensating rollback: without it a failed publish would
                // strand the driver in en_servicio with no assignment.
                error!(
                    driver_id = %driver_id,
                    order_id = %order_id,
                    %publish_error,
                    "accept publish failed, reverting driver availability"
                );
                match repo::revert_to_available(&self.pool, driver_id).await {
                    Ok(true) => info!(driver_id = %driver_id, "driver reverted to disponible"),
                    Ok(false) => warn!(
                        driver_id = %driver_id,
                        "driver state changed before rollback, leaving as-is"
                    ),
                    Err(revert_error) => error!(
                        driver_id = %driver_id,
                        %revert_error,
                        "could not revert driver availability; watchdog will recover"
                    ),
                }
                Err(DriverError::PublishFailed(publish_error))
            },
        }
    }
}

impl std::fmt::Debug for AcceptanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptanceService").finish_non_exhaustive()
    }
}

//! Broker consumers: new orders from the bot, acceptances from drivers.

use async_trait::async_trait;
use rumbo_broker::{HandlerError, MessageHandler};
use rumbo_core::{DriverAcceptedEvent, OrderPayload};
use tracing::{info, warn};

use crate::error::OrdersError;
use crate::service::OrderService;

/// Consumes `pedido.nuevo`: order payloads completed by the dialogue engine.
#[derive(Debug)]
pub struct NewOrderHandler {
    service: OrderService,
}

impl NewOrderHandler {
    /// Wrap the service for consumption.
    #[must_use]
    pub fn new(service: OrderService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for NewOrderHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        let order: OrderPayload = serde_json::from_slice(payload)
            .map_err(|error| HandlerError::Malformed(error.to_string()))?;

        info!(
            tipo_servicio = %order.tipo_servicio,
            cliente = order
                .nombre_cliente
                .as_deref()
                .unwrap_or(order.id_cliente_externo.as_str()),
            "order event received"
        );

        let record = self
            .service
            .create_order(&order)
            .await
            .map_err(|error| HandlerError::Failed(error.to_string()))?;

        info!(order_id = %record.id_pedido, "order created from broker event");
        Ok(())
    }
}

/// Consumes `pedido.conductor_acepto`: the acceptance race winners.
#[derive(Debug)]
pub struct DriverAcceptedHandler {
    service: OrderService,
}

impl DriverAcceptedHandler {
    /// Wrap the service for consumption.
    #[must_use]
    pub fn new(service: OrderService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for DriverAcceptedHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        let event: DriverAcceptedEvent = serde_json::from_slice(payload)
            .map_err(|error| HandlerError::Malformed(error.to_string()))?;

        match self.service.apply_driver_acceptance(&event).await {
            Ok(updated) => {
                info!(
                    order_id = %updated.id_pedido,
                    driver_id = %event.id_conductor_que_acepto,
                    "acceptance applied"
                );
                Ok(())
            },
            // Expected outcomes of the acceptance race: the order is gone or
            // another driver got there first. Ack and move on — the losing
            // driver is recovered by the driver-service watchdog.
            Err(
                error @ (OrdersError::NotFound
                | OrdersError::TransitionForbidden { .. }
                | OrdersError::ConcurrentModification),
            ) => {
                warn!(
                    order_id = %event.id_pedido,
                    driver_id = %event.id_conductor_que_acepto,
                    %error,
                    "acceptance not applied"
                );
                Ok(())
            },
            Err(error) => Err(HandlerError::Failed(error.to_string())),
        }
    }
}

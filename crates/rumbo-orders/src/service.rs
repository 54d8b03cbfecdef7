//! Order lifecycle orchestration: creation, transitions, event emission.

use std::sync::Arc;

use rumbo_broker::{Broker, topology};
use rumbo_core::{
    ClientNotificationEvent, DispatchEvent, DriverAcceptedEvent, OrderId, OrderPayload,
    OrderStatus,
};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::OrdersError;
use crate::models::{OrderRecord, UpdateOrderRequest};
use crate::repo;
use crate::transitions;

/// The order state machine service.
///
/// One instance per process, constructed at init and shared by the API and
/// the broker consumers.
#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    broker: Arc<Broker>,
}

impl OrderService {
    /// Build the service over its store and broker handles.
    #[must_use]
    pub fn new(pool: PgPool, broker: Arc<Broker>) -> Self {
        Self { pool, broker }
    }

    /// Database pool, for health checks.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create an order and put it in play.
    ///
    /// Persists atomically with its items in `solicitado`, transitions to
    /// `confirmado`, and publishes the dispatch event that starts the
    /// driver fan-out.
    ///
    /// # Errors
    ///
    /// Returns [`OrdersError`] on database or broker failure.
    pub async fn create_order(&self, payload: &OrderPayload) -> Result<OrderRecord, OrdersError> {
        if matches!(
            payload.tipo_servicio,
            rumbo_core::ServiceType::Compras | rumbo_core::ServiceType::Domicilio
        ) && payload.id_empresa_asociada.is_none()
            && payload.items_pedido.is_empty()
        {
            warn!(
                tipo_servicio = %payload.tipo_servicio,
                "order without merchant or items"
            );
        }

        let created = repo::create_order(&self.pool, payload).await?;
        info!(order_id = %created.id_pedido, status = %created.estado_pedido, "order created");

        let confirmed = repo::transition(
            &self.pool,
            created.id_pedido,
            OrderStatus::Solicitado,
            OrderStatus::Confirmado,
            None,
        )
        .await?
        .ok_or(OrdersError::ConcurrentModification)?;

        let event = Self::dispatch_event(&confirmed, payload);
        info!(order_id = %confirmed.id_pedido, "publishing dispatch event");
        self.broker
            .publish_json(&topology::MOTOTAXI_DISPATCH, &event)
            .await?;

        Ok(confirmed)
    }

    fn dispatch_event(order: &OrderRecord, payload: &OrderPayload) -> DispatchEvent {
        DispatchEvent {
            id_pedido: order.id_pedido,
            tipo_servicio: order.tipo_servicio,
            origen_descripcion: order.origen_descripcion.clone(),
            origen_latitud: order.origen_latitud,
            origen_longitud: order.origen_longitud,
            destino_descripcion: order.destino_descripcion.clone(),
            destino_latitud: order.destino_latitud,
            destino_longitud: order.destino_longitud,
            nombre_cliente: order.nombre_cliente.clone(),
            telefono_cliente: order.telefono_cliente.clone(),
            id_empresa_asociada: order.id_empresa_asociada.clone(),
            items_pedido: payload.items_pedido.clone(),
            detalles_adicionales_pedido: order.detalles_adicionales_pedido.clone(),
            metodo_pago_sugerido: order.metodo_pago_sugerido.clone(),
            monto_estimado_pedido: order.monto_estimado_pedido,
            fecha_solicitud_utc: order.fecha_creacion_pedido,
        }
    }

    /// Apply an API-originated update, subject to the transition matrix.
    ///
    /// # Errors
    ///
    /// [`OrdersError::NotFound`] for unknown ids,
    /// [`OrdersError::TransitionForbidden`] for off-matrix changes,
    /// [`OrdersError::ConcurrentModification`] when another writer won.
    pub async fn update_order(
        &self,
        order_id: OrderId,
        update: &UpdateOrderRequest,
    ) -> Result<OrderRecord, OrdersError> {
        let current = repo::get_order(&self.pool, order_id)
            .await?
            .ok_or(OrdersError::NotFound)?;

        let Some(target) = update.estado_pedido else {
            // No status change: at most a driver assignment.
            if let Some(driver_id) = update.id_conductor_asignado {
                return repo::set_driver(&self.pool, order_id, driver_id)
                    .await?
                    .ok_or(OrdersError::NotFound);
            }
            return Ok(current);
        };

        if target == current.estado_pedido {
            return Ok(current);
        }

        if !transitions::can_transition(current.estado_pedido, target) {
            warn!(
                order_id = %order_id,
                from = %current.estado_pedido,
                to = %target,
                "state transition rejected"
            );
            return Err(OrdersError::TransitionForbidden {
                from: current.estado_pedido,
                to: target,
            });
        }

        let updated = repo::transition(
            &self.pool,
            order_id,
            current.estado_pedido,
            target,
            update.id_conductor_asignado,
        )
        .await?
        .ok_or(OrdersError::ConcurrentModification)?;

        info!(order_id = %order_id, status = %updated.estado_pedido, "order updated");
        Ok(updated)
    }

    /// Apply a driver acceptance coming off the broker.
    ///
    /// The matrix has the final word: if another driver already won, the
    /// transition is rejected, nothing is emitted, and the caller acks the
    /// delivery (the race is expected, not a poison message).
    ///
    /// # Errors
    ///
    /// Returns [`OrdersError`] for store/broker failures and for the
    /// expected rejection cases ([`OrdersError::NotFound`],
    /// [`OrdersError::TransitionForbidden`],
    /// [`OrdersError::ConcurrentModification`]).
    pub async fn apply_driver_acceptance(
        &self,
        event: &DriverAcceptedEvent,
    ) -> Result<OrderRecord, OrdersError> {
        let current = repo::get_order(&self.pool, event.id_pedido)
            .await?
            .ok_or(OrdersError::NotFound)?;

        let target = event.nuevo_estado_para_pedido;
        if !transitions::can_transition(current.estado_pedido, target) {
            return Err(OrdersError::TransitionForbidden {
                from: current.estado_pedido,
                to: target,
            });
        }

        let updated = repo::transition(
            &self.pool,
            event.id_pedido,
            current.estado_pedido,
            target,
            Some(event.id_conductor_que_acepto),
        )
        .await?
        .ok_or(OrdersError::ConcurrentModification)?;

        info!(
            order_id = %updated.id_pedido,
            driver_id = %event.id_conductor_que_acepto,
            "driver assigned to order"
        );

        if updated.estado_pedido == OrderStatus::AsignadoConductor {
            let notification = Self::client_notification(&updated, event);
            self.broker
                .publish_json(&topology::CLIENT_NOTIFICATIONS, &notification)
                .await?;
        }

        Ok(updated)
    }

    fn client_notification(
        order: &OrderRecord,
        event: &DriverAcceptedEvent,
    ) -> ClientNotificationEvent {
        let driver_name = event.nombre_conductor.as_deref().unwrap_or("asignado");
        let plate = event.placa_vehiculo_activa.as_deref().unwrap_or("en camino");
        ClientNotificationEvent {
            id_pedido: order.id_pedido,
            id_cliente_externo: order.id_cliente_externo.clone(),
            nombre_cliente: order.nombre_cliente.clone(),
            tipo_servicio: order.tipo_servicio,
            estado_actual_pedido: order.estado_pedido,
            id_conductor_asignado: event.id_conductor_que_acepto,
            nombre_conductor_asignado: event.nombre_conductor.clone(),
            placa_vehiculo_conductor: event.placa_vehiculo_activa.clone(),
            mensaje_para_cliente: format!(
                "¡Buenas noticias! Tu conductor {driver_name} (vehículo {plate}) \
                 está en camino para tu servicio de {}.",
                order.tipo_servicio
            ),
        }
    }
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService").finish_non_exhaustive()
    }
}

//! Order records and API request/response shapes.

use chrono::{DateTime, Utc};
use rumbo_core::{DriverId, OrderId, OrderStatus, ServiceType};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An order row, as stored in the `pedidos` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderRecord {
    /// Order id.
    #[sqlx(try_from = "uuid::Uuid")]
    pub id_pedido: OrderId,
    /// Client id in the originating channel.
    pub id_cliente_externo: Option<String>,
    /// Client display name.
    pub nombre_cliente: Option<String>,
    /// Client phone.
    pub telefono_cliente: Option<String>,
    /// Requested service type.
    #[sqlx(try_from = "String")]
    pub tipo_servicio: ServiceType,
    /// Pickup description.
    pub origen_descripcion: Option<String>,
    /// Pickup latitude.
    pub origen_latitud: Option<f64>,
    /// Pickup longitude.
    pub origen_longitud: Option<f64>,
    /// Drop-off description.
    pub destino_descripcion: Option<String>,
    /// Drop-off latitude.
    pub destino_latitud: Option<f64>,
    /// Drop-off longitude.
    pub destino_longitud: Option<f64>,
    /// Merchant id, when the order references one.
    pub id_empresa_asociada: Option<String>,
    /// Free-text order instructions.
    pub detalles_adicionales_pedido: Option<String>,
    /// Suggested payment method.
    pub metodo_pago_sugerido: Option<String>,
    /// Estimated amount.
    pub monto_estimado_pedido: Option<f64>,
    /// Current status.
    #[sqlx(try_from = "String")]
    pub estado_pedido: OrderStatus,
    /// Assigned driver, set iff the status is in the driver-bound segment.
    pub id_conductor_asignado: Option<Uuid>,
    /// Creation timestamp.
    pub fecha_creacion_pedido: DateTime<Utc>,
    /// Last update timestamp.
    pub fecha_ultima_actualizacion: DateTime<Utc>,
    /// When a driver was assigned.
    pub fecha_asignacion: Option<DateTime<Utc>>,
}

/// An order item row, as stored in the `items_pedido` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItemRecord {
    /// Item row id.
    pub id_item: Uuid,
    /// Owning order.
    pub id_pedido: Uuid,
    /// Merchant menu item id.
    pub id_item_menu_empresa: Option<String>,
    /// Item name.
    pub nombre_item: String,
    /// Quantity.
    pub cantidad: i32,
    /// Unit price at order time.
    pub precio_unitario_registrado: Option<f64>,
    /// Item notes.
    pub notas_item: Option<String>,
}

/// Update request for an existing order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrderRequest {
    /// Requested status, checked against the transition matrix.
    #[serde(default)]
    pub estado_pedido: Option<OrderStatus>,
    /// Driver to assign.
    #[serde(default)]
    pub id_conductor_asignado: Option<DriverId>,
}

/// Full order representation returned by the API.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// The order row.
    #[serde(flatten)]
    pub order: OrderRecord,
    /// Its items.
    pub items_pedido: Vec<OrderItemRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_accepts_partial_bodies() {
        let update: UpdateOrderRequest =
            serde_json::from_str(r#"{"estado_pedido": "buscando_conductor"}"#).unwrap();
        assert_eq!(update.estado_pedido, Some(OrderStatus::BuscandoConductor));
        assert!(update.id_conductor_asignado.is_none());

        let empty: UpdateOrderRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.estado_pedido.is_none());
    }

    #[test]
    fn update_request_rejects_invalid_status() {
        let result = serde_json::from_str::<UpdateOrderRequest>(r#"{"estado_pedido": "volando"}"#);
        assert!(result.is_err());
    }
}

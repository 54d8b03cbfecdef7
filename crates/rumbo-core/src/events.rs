//! Broker and push-channel wire bodies.
//!
//! All broker messages are UTF-8 JSON with these exact field names; the
//! producing and consuming services must stay in lockstep, so the types live
//! here rather than in any one service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DriverId, OrderId};
use crate::order::{OrderItem, OrderStatus, ServiceType};

/// Inbound chat message, queued by the webhook for async processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel sender id, prefix included (e.g. `whatsapp:+57300...`).
    pub sender_number: String,
    /// Sender display name, when the channel provides one.
    #[serde(default)]
    pub profile_name: Option<String>,
    /// Text body, when present.
    #[serde(default)]
    pub message_body: Option<String>,
    /// Number of attached media items.
    #[serde(default)]
    pub num_media: u32,
    /// URL of the first media attachment.
    #[serde(default)]
    pub media_url: Option<String>,
    /// MIME type of the first media attachment.
    #[serde(default)]
    pub media_content_type: Option<String>,
    /// When the webhook received the message.
    pub received_at: DateTime<Utc>,
}

/// Dispatch event: a confirmed order looking for a driver.
///
/// Published by the orders service on `pedido.requiere_mototaxi`, consumed
/// by the driver service fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    /// The order being dispatched.
    pub id_pedido: OrderId,
    /// Requested service type.
    pub tipo_servicio: ServiceType,
    /// Pickup description.
    #[serde(default)]
    pub origen_descripcion: Option<String>,
    /// Pickup latitude.
    #[serde(default)]
    pub origen_latitud: Option<f64>,
    /// Pickup longitude.
    #[serde(default)]
    pub origen_longitud: Option<f64>,
    /// Drop-off description.
    #[serde(default)]
    pub destino_descripcion: Option<String>,
    /// Drop-off latitude.
    #[serde(default)]
    pub destino_latitud: Option<f64>,
    /// Drop-off longitude.
    #[serde(default)]
    pub destino_longitud: Option<f64>,
    /// Client display name.
    #[serde(default)]
    pub nombre_cliente: Option<String>,
    /// Client phone number.
    #[serde(default)]
    pub telefono_cliente: Option<String>,
    /// Merchant id, when the order references one.
    #[serde(default)]
    pub id_empresa_asociada: Option<String>,
    /// Items for shopping/delivery orders.
    #[serde(default)]
    pub items_pedido: Vec<OrderItem>,
    /// Free-text order instructions.
    #[serde(default)]
    pub detalles_adicionales_pedido: Option<String>,
    /// Suggested payment method.
    #[serde(default)]
    pub metodo_pago_sugerido: Option<String>,
    /// Estimated amount.
    #[serde(default)]
    pub monto_estimado_pedido: Option<f64>,
    /// UTC creation timestamp of the order.
    pub fecha_solicitud_utc: DateTime<Utc>,
}

/// Accept event: a driver won (at the driver service) the acceptance race.
///
/// Published on `pedido.conductor_acepto`, consumed by the orders service,
/// which has the final word via its transition matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAcceptedEvent {
    /// The accepted order.
    pub id_pedido: OrderId,
    /// The driver who accepted.
    pub id_conductor_que_acepto: DriverId,
    /// Driver display name, for the client notification.
    #[serde(default)]
    pub nombre_conductor: Option<String>,
    /// Plate of the driver's active vehicle, when one is registered.
    #[serde(default)]
    pub placa_vehiculo_activa: Option<String>,
    /// When the driver accepted, UTC.
    pub timestamp_aceptacion_utc: DateTime<Utc>,
    /// Target order status the acceptance requests.
    pub nuevo_estado_para_pedido: OrderStatus,
}

/// Client-notification event: the order got a driver, tell the client.
///
/// Published on `pedido.asignado_notificar_cliente`; consumed both by the
/// chat bot (outbound message) and by the driver service (assignment
/// confirmation for the watchdog).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientNotificationEvent {
    /// The assigned order.
    pub id_pedido: OrderId,
    /// Channel id to notify.
    #[serde(default)]
    pub id_cliente_externo: Option<String>,
    /// Client display name.
    #[serde(default)]
    pub nombre_cliente: Option<String>,
    /// Service type of the order.
    pub tipo_servicio: ServiceType,
    /// Order status after the assignment.
    pub estado_actual_pedido: OrderStatus,
    /// The winning driver.
    pub id_conductor_asignado: DriverId,
    /// Winning driver's display name.
    #[serde(default)]
    pub nombre_conductor_asignado: Option<String>,
    /// Winning driver's vehicle plate.
    #[serde(default)]
    pub placa_vehiculo_conductor: Option<String>,
    /// Ready-to-send message for the client.
    pub mensaje_para_cliente: String,
}

/// Location update sent by a driver over the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationData {
    /// Driver latitude.
    pub latitude: f64,
    /// Driver longitude.
    pub longitude: f64,
    /// When the fix was taken, UTC. Defaults to receive time.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Fix accuracy in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Speed in km/h.
    #[serde(default)]
    pub speed: Option<f64>,
}

/// Server→driver frames on the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverPushMessage {
    /// A new order is available for acceptance.
    NuevoServicioDisponible {
        /// The dispatch event payload.
        data: DispatchEvent,
    },
    /// Sent once right after a successful channel open.
    ConnectionAck {
        /// Human-readable greeting.
        message: String,
    },
    /// A per-frame problem with something the driver sent.
    Error {
        /// What went wrong.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch_event() -> DispatchEvent {
        DispatchEvent {
            id_pedido: OrderId::new(),
            tipo_servicio: ServiceType::Mototaxi,
            origen_descripcion: Some("parque".to_string()),
            origen_latitud: None,
            origen_longitud: None,
            destino_descripcion: Some("hospital".to_string()),
            destino_latitud: None,
            destino_longitud: None,
            nombre_cliente: Some("Juan".to_string()),
            telefono_cliente: Some("+573001234567".to_string()),
            id_empresa_asociada: None,
            items_pedido: Vec::new(),
            detalles_adicionales_pedido: None,
            metodo_pago_sugerido: Some("efectivo".to_string()),
            monto_estimado_pedido: None,
            fecha_solicitud_utc: Utc::now(),
        }
    }

    #[test]
    fn dispatch_event_field_names() {
        let value = serde_json::to_value(dispatch_event()).unwrap();
        assert_eq!(value["tipo_servicio"], "mototaxi");
        assert_eq!(value["origen_descripcion"], "parque");
        assert_eq!(value["destino_descripcion"], "hospital");
        assert_eq!(value["metodo_pago_sugerido"], "efectivo");
        assert_eq!(value["nombre_cliente"], "Juan");
        assert!(value.get("fecha_solicitud_utc").is_some());
    }

    #[test]
    fn push_envelope_shape() {
        let frame = DriverPushMessage::NuevoServicioDisponible {
            data: dispatch_event(),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "nuevo_servicio_disponible");
        assert_eq!(value["data"]["origen_descripcion"], "parque");

        let ack = DriverPushMessage::ConnectionAck {
            message: "Conectado al servidor de ubicación.".to_string(),
        };
        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(value["type"], "connection_ack");
        assert!(value["message"].is_string());
    }

    #[test]
    fn location_timestamp_defaults() {
        let data: LocationData =
            serde_json::from_str(r#"{"latitude": 10.46314, "longitude": -73.25322}"#).unwrap();
        assert!(data.accuracy.is_none());
        assert!((data.latitude - 10.46314).abs() < f64::EPSILON);
    }

    #[test]
    fn accept_event_roundtrip() {
        let event = DriverAcceptedEvent {
            id_pedido: OrderId::new(),
            id_conductor_que_acepto: DriverId::new(),
            nombre_conductor: Some("Carlos".to_string()),
            placa_vehiculo_activa: Some("ABC123".to_string()),
            timestamp_aceptacion_utc: Utc::now(),
            nuevo_estado_para_pedido: OrderStatus::AsignadoConductor,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: DriverAcceptedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id_pedido, event.id_pedido);
        assert_eq!(back.nuevo_estado_para_pedido, OrderStatus::AsignadoConductor);
    }
}

//! Order vocabulary: service types, the order status token set, and the
//! payload published by the chat bot when a dialogue completes.
//!
//! Status and service-type tokens are the Spanish wire tokens every service
//! stores and exchanges; the enums exist so no service can invent a state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of service a client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Point-to-point motorcycle taxi ride.
    Mototaxi,
    /// Home delivery from a merchant.
    Domicilio,
    /// Errand shopping on behalf of the client.
    Compras,
    /// Anything else; the catch-all bucket.
    Otro,
}

impl ServiceType {
    /// All known service types, in presentation order.
    pub const ALL: [ServiceType; 4] = [
        ServiceType::Mototaxi,
        ServiceType::Domicilio,
        ServiceType::Compras,
        ServiceType::Otro,
    ];

    /// Wire token for this service type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Mototaxi => "mototaxi",
            ServiceType::Domicilio => "domicilio",
            ServiceType::Compras => "compras",
            ServiceType::Otro => "otro",
        }
    }

    /// Normalize free text coming out of the extraction collaborator.
    ///
    /// Trims, lowercases, and maps anything outside the canonical set to
    /// [`ServiceType::Otro`].
    #[must_use]
    pub fn normalize(raw: &str) -> ServiceType {
        match raw.trim().to_lowercase().as_str() {
            "mototaxi" => ServiceType::Mototaxi,
            "domicilio" => ServiceType::Domicilio,
            "compras" => ServiceType::Compras,
            _ => ServiceType::Otro,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = StatusParseError;

    /// Strict parse of a stored token; unlike [`ServiceType::normalize`],
    /// unknown input is an error rather than `otro`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceType::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| StatusParseError(s.to_string()))
    }
}

impl TryFrom<String> for ServiceType {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A status token that is not part of the order state machine.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown order status: {0}")]
pub struct StatusParseError(pub String);

/// The full order status set.
///
/// The allowed-transition matrix over these states lives in the orders
/// service; everything else only reads and forwards the tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Received from the bot, awaiting validation.
    Solicitado,
    /// Accepted by the orders service.
    Confirmado,
    /// Actively looking for a driver.
    BuscandoConductor,
    /// A driver won the acceptance race.
    AsignadoConductor,
    /// A merchant is preparing the order.
    EnProcesoEmpresa,
    /// Ready for driver pickup at the merchant.
    ListoParaRecoger,
    /// Driver heading to the origin.
    EnCaminoOrigen,
    /// Driver arrived at the origin.
    EnOrigen,
    /// Trip under way.
    ViajeIniciado,
    /// Driver arrived at the destination.
    EnDestino,
    /// Goods/passenger delivered.
    Entregado,
    /// Fully closed out.
    Completado,
    /// Cancelled by the client.
    CanceladoUsuario,
    /// Cancelled by the platform.
    CanceladoSistema,
    /// Cancelled by the driver.
    CanceladoConductor,
    /// A problem was reported mid-trip.
    ProblemaReportado,
}

impl OrderStatus {
    /// Wire/storage token for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Solicitado => "solicitado",
            OrderStatus::Confirmado => "confirmado",
            OrderStatus::BuscandoConductor => "buscando_conductor",
            OrderStatus::AsignadoConductor => "asignado_conductor",
            OrderStatus::EnProcesoEmpresa => "en_proceso_empresa",
            OrderStatus::ListoParaRecoger => "listo_para_recoger",
            OrderStatus::EnCaminoOrigen => "en_camino_origen",
            OrderStatus::EnOrigen => "en_origen",
            OrderStatus::ViajeIniciado => "viaje_iniciado",
            OrderStatus::EnDestino => "en_destino",
            OrderStatus::Entregado => "entregado",
            OrderStatus::Completado => "completado",
            OrderStatus::CanceladoUsuario => "cancelado_usuario",
            OrderStatus::CanceladoSistema => "cancelado_sistema",
            OrderStatus::CanceladoConductor => "cancelado_conductor",
            OrderStatus::ProblemaReportado => "problema_reportado",
        }
    }

    /// All valid statuses.
    pub const ALL: [OrderStatus; 16] = [
        OrderStatus::Solicitado,
        OrderStatus::Confirmado,
        OrderStatus::BuscandoConductor,
        OrderStatus::AsignadoConductor,
        OrderStatus::EnProcesoEmpresa,
        OrderStatus::ListoParaRecoger,
        OrderStatus::EnCaminoOrigen,
        OrderStatus::EnOrigen,
        OrderStatus::ViajeIniciado,
        OrderStatus::EnDestino,
        OrderStatus::Entregado,
        OrderStatus::Completado,
        OrderStatus::CanceladoUsuario,
        OrderStatus::CanceladoSistema,
        OrderStatus::CanceladoConductor,
        OrderStatus::ProblemaReportado,
    ];

    /// Whether this status carries an assigned driver.
    ///
    /// `assigned_driver_id` is set if and only if the order sits in the
    /// driver-bound segment of the lifecycle.
    #[must_use]
    pub fn requires_driver(self) -> bool {
        matches!(
            self,
            OrderStatus::AsignadoConductor
                | OrderStatus::EnCaminoOrigen
                | OrderStatus::EnOrigen
                | OrderStatus::ViajeIniciado
                | OrderStatus::EnDestino
                | OrderStatus::Entregado
                | OrderStatus::Completado
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusParseError(s.to_string()))
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One item inside a shopping or delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Merchant-side menu item id, when the order references a catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_item_menu_empresa: Option<String>,
    /// Item name as the client stated it.
    pub nombre_item: String,
    /// Quantity; always strictly positive.
    pub cantidad: u32,
    /// Unit price captured at order time, for reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precio_unitario_registrado: Option<f64>,
    /// Free-text notes for this item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notas_item: Option<String>,
}

/// Order creation payload, published on `pedido.nuevo` by the chat bot and
/// accepted verbatim by the orders REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPayload {
    /// Client id in the originating channel (e.g. the WhatsApp sender id).
    pub id_cliente_externo: String,
    /// Client display name.
    #[serde(default)]
    pub nombre_cliente: Option<String>,
    /// Client phone number, without the channel prefix.
    pub telefono_cliente: String,
    /// Requested service type.
    pub tipo_servicio: ServiceType,
    /// Pickup description.
    #[serde(default)]
    pub origen_descripcion: Option<String>,
    /// Pickup latitude, when known.
    #[serde(default)]
    pub origen_latitud: Option<f64>,
    /// Pickup longitude, when known.
    #[serde(default)]
    pub origen_longitud: Option<f64>,
    /// Drop-off description.
    #[serde(default)]
    pub destino_descripcion: Option<String>,
    /// Drop-off latitude, when known.
    #[serde(default)]
    pub destino_latitud: Option<f64>,
    /// Drop-off longitude, when known.
    #[serde(default)]
    pub destino_longitud: Option<f64>,
    /// Merchant id for shopping/delivery orders.
    #[serde(default)]
    pub id_empresa_asociada: Option<String>,
    /// Free-text instructions for the whole order.
    #[serde(default)]
    pub detalles_adicionales_pedido: Option<String>,
    /// Payment method the client suggested.
    #[serde(default)]
    pub metodo_pago_sugerido: Option<String>,
    /// Estimated order amount.
    #[serde(default)]
    pub monto_estimado_pedido: Option<f64>,
    /// Items, for shopping/delivery orders.
    #[serde(default)]
    pub items_pedido: Vec<OrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tokens_roundtrip() {
        for status in OrderStatus::ALL {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn status_serde_matches_tokens() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "en_camino_cliente".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err, StatusParseError("en_camino_cliente".to_string()));
    }

    #[test]
    fn normalize_maps_unknown_to_otro() {
        assert_eq!(ServiceType::normalize("MOTOTAXI "), ServiceType::Mototaxi);
        assert_eq!(ServiceType::normalize("domicilio"), ServiceType::Domicilio);
        assert_eq!(ServiceType::normalize("paseo en bote"), ServiceType::Otro);
        assert_eq!(ServiceType::normalize(""), ServiceType::Otro);
    }

    #[test]
    fn driver_bound_segment() {
        assert!(OrderStatus::AsignadoConductor.requires_driver());
        assert!(OrderStatus::Completado.requires_driver());
        assert!(!OrderStatus::Confirmado.requires_driver());
        assert!(!OrderStatus::CanceladoConductor.requires_driver());
    }

    #[test]
    fn order_payload_wire_names() {
        let payload = OrderPayload {
            id_cliente_externo: "whatsapp:+573001234567".to_string(),
            nombre_cliente: Some("Juan".to_string()),
            telefono_cliente: "+573001234567".to_string(),
            tipo_servicio: ServiceType::Mototaxi,
            origen_descripcion: Some("parque".to_string()),
            origen_latitud: None,
            origen_longitud: None,
            destino_descripcion: Some("hospital".to_string()),
            destino_latitud: None,
            destino_longitud: None,
            id_empresa_asociada: None,
            detalles_adicionales_pedido: None,
            metodo_pago_sugerido: Some("efectivo".to_string()),
            monto_estimado_pedido: None,
            items_pedido: Vec::new(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["tipo_servicio"], "mototaxi");
        assert_eq!(value["origen_descripcion"], "parque");
        assert_eq!(value["metodo_pago_sugerido"], "efectivo");
    }
}

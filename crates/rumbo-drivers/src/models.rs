//! Driver and vehicle records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rumbo_core::{DriverId, StatusParseError};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Operational availability of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Ready to take services.
    Disponible,
    /// Off shift.
    NoDisponible,
    /// Currently on a service.
    EnServicio,
}

impl Availability {
    /// Wire/storage token.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Disponible => "disponible",
            Availability::NoDisponible => "no_disponible",
            Availability::EnServicio => "en_servicio",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disponible" => Ok(Availability::Disponible),
            "no_disponible" => Ok(Availability::NoDisponible),
            "en_servicio" => Ok(Availability::EnServicio),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

impl TryFrom<String> for Availability {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Account validation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// Documents under review.
    Pendiente,
    /// Cleared to drive.
    Aprobado,
    /// Rejected.
    Rechazado,
}

impl ValidationState {
    /// Wire/storage token.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationState::Pendiente => "pendiente",
            ValidationState::Aprobado => "aprobado",
            ValidationState::Rechazado => "rechazado",
        }
    }
}

impl FromStr for ValidationState {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendiente" => Ok(ValidationState::Pendiente),
            "aprobado" => Ok(ValidationState::Aprobado),
            "rechazado" => Ok(ValidationState::Rechazado),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

impl TryFrom<String> for ValidationState {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A driver row, as stored in the `conductores` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DriverRecord {
    /// Driver id.
    #[sqlx(try_from = "uuid::Uuid")]
    pub id_conductor: DriverId,
    /// Full display name.
    pub nombre_completo: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    pub telefono: String,
    /// Whether the platform account is active at all.
    pub activo: bool,
    /// Document validation state.
    #[sqlx(try_from = "String")]
    pub estado_validacion_general: ValidationState,
    /// Current operational availability.
    #[sqlx(try_from = "String")]
    pub estado_disponibilidad: Availability,
    /// When the driver flipped to `en_servicio`, if they are on one.
    pub en_servicio_desde: Option<DateTime<Utc>>,
    /// The order the driver accepted, pending or confirmed.
    pub id_pedido_activo: Option<Uuid>,
    /// Whether the orders service confirmed the assignment back.
    pub asignacion_confirmada: bool,
}

impl DriverRecord {
    /// The dispatch candidacy predicate.
    ///
    /// A driver is a candidate iff the account is active, validation is
    /// `aprobado`, and availability is `disponible`.
    #[must_use]
    pub fn is_candidate(&self) -> bool {
        self.activo
            && self.estado_validacion_general == ValidationState::Aprobado
            && self.estado_disponibilidad == Availability::Disponible
    }
}

/// Availability change request body.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    /// The availability to switch to.
    pub nuevo_estado: Availability,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(
        activo: bool,
        validation: ValidationState,
        availability: Availability,
    ) -> DriverRecord {
        DriverRecord {
            id_conductor: DriverId::new(),
            nombre_completo: "Carlos Pérez".to_string(),
            email: "carlos@example.com".to_string(),
            telefono: "+573001112233".to_string(),
            activo,
            estado_validacion_general: validation,
            estado_disponibilidad: availability,
            en_servicio_desde: None,
            id_pedido_activo: None,
            asignacion_confirmada: false,
        }
    }

    #[test]
    fn candidacy_requires_all_three_conditions() {
        assert!(driver(true, ValidationState::Aprobado, Availability::Disponible).is_candidate());

        assert!(!driver(false, ValidationState::Aprobado, Availability::Disponible).is_candidate());
        assert!(!driver(true, ValidationState::Pendiente, Availability::Disponible).is_candidate());
        assert!(!driver(true, ValidationState::Rechazado, Availability::Disponible).is_candidate());
        assert!(!driver(true, ValidationState::Aprobado, Availability::EnServicio).is_candidate());
        assert!(!driver(true, ValidationState::Aprobado, Availability::NoDisponible).is_candidate());
    }

    #[test]
    fn availability_tokens_roundtrip() {
        for availability in [
            Availability::Disponible,
            Availability::NoDisponible,
            Availability::EnServicio,
        ] {
            let parsed: Availability = availability.as_str().parse().unwrap();
            assert_eq!(parsed, availability);
        }
        assert!("ocupado".parse::<Availability>().is_err());
    }

    #[test]
    fn status_update_deserializes() {
        let update: StatusUpdateRequest =
            serde_json::from_str(r#"{"nuevo_estado": "no_disponible"}"#).unwrap();
        assert_eq!(update.nuevo_estado, Availability::NoDisponible);
    }
}

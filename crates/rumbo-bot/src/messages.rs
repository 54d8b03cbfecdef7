//! The bot's Spanish message catalog.
//!
//! Every string the bot sends lives here; nothing user-facing is hardcoded
//! at the call sites.

use rumbo_core::ServiceType;

/// Reply when a second message arrives while a turn is processing.
pub const PROCESSING_MESSAGE: &str =
    "Estoy procesando tu solicitud, por favor espera un momento...";

/// Reply when an order could not be submitted.
pub const ORDER_FAILED: &str =
    "Lo siento, tuvimos un problema al enviar tu pedido. Intenta de nuevo más tarde.";

/// Greeting for senders who have been away a while.
#[must_use]
pub fn welcome(name: &str) -> String {
    format!(
        "¡Hola {name}! 👋 Soy tu asistente virtual. Ofrezco servicios de:\n\
         1️⃣ Mototaxi 🏍️\n\
         2️⃣ Domicilios 🛍️\n\
         3️⃣ Compras 🛒\n\n\
         Dime qué servicio necesitas o envía un mensaje de voz."
    )
}

/// Ask which service the sender wants, listing the options.
#[must_use]
pub fn service_type_prompt(name: &str) -> String {
    format!(
        "Por favor, {name}, ¿qué tipo de servicio necesitas?\n{}",
        services_list()
    )
}

/// Ask for the fields still missing for the chosen service.
#[must_use]
pub fn missing_fields_prompt(name: &str, service_type: ServiceType, missing: &[String]) -> String {
    format!(
        "¡Entendido, {name}! Para tu servicio de *{}*, necesito: {}.",
        capitalize(service_type.as_str()),
        missing.join(", ")
    )
}

/// Confirmation after the order is on its way.
#[must_use]
pub fn order_confirmed(service_type: ServiceType) -> String {
    format!(
        "¡Tu pedido de *{}* ha sido recibido y está siendo procesado! 🏍️🛍️\n\
         Te mantendremos informado.",
        service_type.as_str()
    )
}

/// Audio arrived but could not be understood.
#[must_use]
pub fn audio_not_understood(name: &str) -> String {
    format!("¡Hola {name}! Recibí tu audio, pero no pude entenderlo.")
}

/// Audio processing broke.
#[must_use]
pub fn audio_error(name: &str) -> String {
    format!("¡Hola {name}! Hubo un problema al procesar tu audio.")
}

/// Non-audio media is not supported.
#[must_use]
pub fn unsupported_media(name: &str) -> String {
    format!("¡Hola {name}! Recibí un archivo, pero solo proceso audio o texto.")
}

/// The message made no sense.
#[must_use]
pub fn message_not_understood(name: &str) -> String {
    format!("¡Hola {name}! No entendí tu mensaje.")
}

/// The extraction collaborator failed.
#[must_use]
pub fn extraction_error(name: &str) -> String {
    format!("Lo siento {name}, tuve un problema con la IA.")
}

fn services_list() -> String {
    let labels = [
        (ServiceType::Mototaxi, "Mototaxi"),
        (ServiceType::Domicilio, "Domicilios"),
        (ServiceType::Compras, "Compras"),
        (ServiceType::Otro, "Otro servicio"),
    ];
    labels
        .iter()
        .enumerate()
        .map(|(i, (_, label))| format!("{}. {label}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn services_list_has_four_numbered_lines() {
        let list = services_list();
        assert_eq!(list.lines().count(), 4);
        assert!(list.starts_with("1. Mototaxi"));
        assert!(list.ends_with("4. Otro servicio"));
    }

    #[test]
    fn missing_fields_prompt_joins_labels() {
        let prompt = missing_fields_prompt(
            "Ana",
            ServiceType::Domicilio,
            &["destino".to_string(), "metodo pago".to_string()],
        );
        assert!(prompt.contains("*Domicilio*"));
        assert!(prompt.contains("destino, metodo pago"));
    }
}

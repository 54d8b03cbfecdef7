//! The slot-filling dialogue: merge extracted fields into the session,
//! decide what to ask next, and assemble the final order payload.

use rumbo_core::{OrderItem, OrderPayload, ServiceType};
use rumbo_session::UserSession;

use crate::extract::ExtractedFields;
use crate::messages;

/// Fields a service type needs before its order can be submitted.
#[must_use]
pub fn required_fields(service_type: ServiceType) -> &'static [&'static str] {
    match service_type {
        ServiceType::Mototaxi => &["nombre_usuario", "origen", "destino", "metodo_pago"],
        ServiceType::Domicilio => &[
            "nombre_usuario",
            "destino",
            "metodo_pago",
            "detalles_adicionales",
        ],
        ServiceType::Compras => &[
            "nombre_usuario",
            "detalles_adicionales",
            "destino",
            "metodo_pago",
        ],
        ServiceType::Otro => &["nombre_usuario", "detalles_adicionales", "metodo_pago"],
    }
}

const MAX_FIELD_CHARS: usize = 500;

/// What the dialogue should do after a turn's extraction.
#[derive(Debug, PartialEq, Eq)]
pub enum NextStep {
    /// Ask something; the order is not complete yet.
    Ask(String),
    /// All required fields are present.
    Complete,
}

/// Sanitized display name for the sender, 50 chars max, `tú` fallback.
#[must_use]
pub fn display_name(profile_name: Option<&str>) -> String {
    let name: String = profile_name
        .unwrap_or("tú")
        .chars()
        .take(50)
        .collect::<String>()
        .trim()
        .to_string();
    if name.is_empty() { "tú".to_string() } else { name }
}

/// Merge non-empty extracted fields into the session's order data.
///
/// Values are trimmed and capped at 500 characters; the service type is
/// normalized to the canonical set before storage.
pub fn merge_extracted(session: &mut UserSession, extracted: &ExtractedFields) {
    let mut put = |key: &str, value: &Option<String>| {
        if let Some(raw) = value {
            let cleaned: String = raw.trim().chars().take(MAX_FIELD_CHARS).collect();
            if !cleaned.is_empty() {
                session
                    .current_order_data
                    .insert(key.to_string(), cleaned);
            }
        }
    };

    let normalized_service = extracted
        .tipo_servicio
        .as_ref()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| ServiceType::normalize(raw).as_str().to_string());
    put("tipo_servicio", &normalized_service);
    put("origen", &extracted.origen);
    put("destino", &extracted.destino);
    put("nombre_usuario", &extracted.nombre_usuario);
    put("telefono", &extracted.telefono);
    put("metodo_pago", &extracted.metodo_pago);
    put("monto", &extracted.monto);
    put("detalles_adicionales", &extracted.detalles_adicionales);
}

/// Decide the next dialogue step for the session.
#[must_use]
pub fn next_step(session: &UserSession, name: &str) -> NextStep {
    let Some(service_type) = session
        .current_order_data
        .get("tipo_servicio")
        .and_then(|raw| raw.parse::<ServiceType>().ok())
    else {
        return NextStep::Ask(messages::service_type_prompt(name));
    };

    let missing: Vec<String> = required_fields(service_type)
        .iter()
        .filter(|field| {
            session
                .current_order_data
                .get(**field)
                .is_none_or(|value| value.trim().is_empty())
        })
        .map(|field| field.replace('_', " "))
        .collect();

    if missing.is_empty() {
        NextStep::Complete
    } else {
        NextStep::Ask(messages::missing_fields_prompt(name, service_type, &missing))
    }
}

/// Assemble the order payload from a completed session.
#[must_use]
pub fn build_order_payload(
    session: &UserSession,
    sender: &str,
    profile_name: Option<&str>,
) -> OrderPayload {
    let data = &session.current_order_data;
    let get = |key: &str| data.get(key).cloned();

    let service_type = get("tipo_servicio")
        .map(|raw| ServiceType::normalize(&raw))
        .unwrap_or(ServiceType::Otro);

    let amount = get("monto").and_then(|raw| parse_amount(&raw));

    let details = get("detalles_adicionales");
    let mut items = Vec::new();
    if matches!(service_type, ServiceType::Compras | ServiceType::Domicilio)
        && let Some(details) = &details
    {
        items.push(OrderItem {
            id_item_menu_empresa: None,
            nombre_item: details.clone(),
            cantidad: 1,
            precio_unitario_registrado: None,
            notas_item: None,
        });
    }

    OrderPayload {
        id_cliente_externo: sender.to_string(),
        nombre_cliente: get("nombre_usuario").or_else(|| profile_name.map(String::from)),
        telefono_cliente: phone_from_sender(sender),
        tipo_servicio: service_type,
        origen_descripcion: get("origen"),
        origen_latitud: None,
        origen_longitud: None,
        destino_descripcion: get("destino"),
        destino_latitud: None,
        destino_longitud: None,
        id_empresa_asociada: get("id_empresa"),
        detalles_adicionales_pedido: details,
        metodo_pago_sugerido: get("metodo_pago"),
        monto_estimado_pedido: amount,
        items_pedido: items,
    }
}

/// `whatsapp:+573001234567` → `+573001234567`.
fn phone_from_sender(sender: &str) -> String {
    sender.rsplit(':').next().unwrap_or(sender).to_string()
}

/// Pull a number out of free text like `"$25.000 pesos"`.
fn parse_amount(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(pairs: &[(&str, &str)]) -> ExtractedFields {
        let mut fields = ExtractedFields::default();
        for (key, value) in pairs {
            let value = Some((*value).to_string());
            match *key {
                "tipo_servicio" => fields.tipo_servicio = value,
                "origen" => fields.origen = value,
                "destino" => fields.destino = value,
                "nombre_usuario" => fields.nombre_usuario = value,
                "metodo_pago" => fields.metodo_pago = value,
                "monto" => fields.monto = value,
                "detalles_adicionales" => fields.detalles_adicionales = value,
                other => panic!("unknown field {other}"),
            }
        }
        fields
    }

    #[test]
    fn display_name_fallbacks() {
        assert_eq!(display_name(None), "tú");
        assert_eq!(display_name(Some("   ")), "tú");
        assert_eq!(display_name(Some("Ana")), "Ana");
        let long = "x".repeat(80);
        assert_eq!(display_name(Some(&long)).chars().count(), 50);
    }

    #[test]
    fn merge_trims_caps_and_normalizes() {
        let mut session = UserSession::new();
        let long_destination = format!("  {}  ", "d".repeat(600));
        merge_extracted(
            &mut session,
            &extracted(&[
                ("tipo_servicio", " MOTOTAXI "),
                ("destino", long_destination.as_str()),
                ("origen", "   "),
            ]),
        );

        assert_eq!(
            session.current_order_data.get("tipo_servicio").map(String::as_str),
            Some("mototaxi")
        );
        assert_eq!(
            session.current_order_data.get("destino").map(String::len),
            Some(500)
        );
        // Whitespace-only values never land.
        assert!(!session.current_order_data.contains_key("origen"));
    }

    #[test]
    fn unknown_service_becomes_otro() {
        let mut session = UserSession::new();
        merge_extracted(&mut session, &extracted(&[("tipo_servicio", "helicóptero")]));
        assert_eq!(
            session.current_order_data.get("tipo_servicio").map(String::as_str),
            Some("otro")
        );
    }

    #[test]
    fn asks_for_service_type_first() {
        let session = UserSession::new();
        match next_step(&session, "Ana") {
            NextStep::Ask(prompt) => assert!(prompt.contains("qué tipo de servicio")),
            NextStep::Complete => panic!("should ask for service type"),
        }
    }

    #[test]
    fn slot_filling_over_two_turns() {
        // Turn 1: "quiero un domicilio" — only the service type lands.
        let mut session = UserSession::new();
        merge_extracted(&mut session, &extracted(&[("tipo_servicio", "domicilio")]));

        match next_step(&session, "Ana") {
            NextStep::Ask(prompt) => {
                assert!(prompt.contains("*Domicilio*"));
                for label in ["nombre usuario", "destino", "metodo pago", "detalles adicionales"] {
                    assert!(prompt.contains(label), "prompt should list '{label}'");
                }
            },
            NextStep::Complete => panic!("turn 1 should be incomplete"),
        }

        // Turn 2: "soy Ana, llevar a calle 5, efectivo, una pizza".
        merge_extracted(
            &mut session,
            &extracted(&[
                ("nombre_usuario", "Ana"),
                ("destino", "calle 5"),
                ("metodo_pago", "efectivo"),
                ("detalles_adicionales", "una pizza"),
            ]),
        );
        assert_eq!(next_step(&session, "Ana"), NextStep::Complete);
    }

    #[test]
    fn mototaxi_requires_origin_and_destination() {
        let mut session = UserSession::new();
        merge_extracted(
            &mut session,
            &extracted(&[
                ("tipo_servicio", "mototaxi"),
                ("nombre_usuario", "Juan"),
                ("metodo_pago", "efectivo"),
            ]),
        );
        match next_step(&session, "Juan") {
            NextStep::Ask(prompt) => {
                assert!(prompt.contains("origen"));
                assert!(prompt.contains("destino"));
                assert!(!prompt.contains("nombre usuario"));
            },
            NextStep::Complete => panic!("missing origin/destination"),
        }
    }

    #[test]
    fn builds_full_mototaxi_payload() {
        let mut session = UserSession::new();
        merge_extracted(
            &mut session,
            &extracted(&[
                ("tipo_servicio", "mototaxi"),
                ("origen", "parque"),
                ("destino", "hospital"),
                ("nombre_usuario", "Juan"),
                ("metodo_pago", "efectivo"),
            ]),
        );
        assert_eq!(next_step(&session, "Juan"), NextStep::Complete);

        let payload = build_order_payload(&session, "whatsapp:+573001234567", None);
        assert_eq!(payload.tipo_servicio, ServiceType::Mototaxi);
        assert_eq!(payload.origen_descripcion.as_deref(), Some("parque"));
        assert_eq!(payload.destino_descripcion.as_deref(), Some("hospital"));
        assert_eq!(payload.metodo_pago_sugerido.as_deref(), Some("efectivo"));
        assert_eq!(payload.nombre_cliente.as_deref(), Some("Juan"));
        assert_eq!(payload.telefono_cliente, "+573001234567");
        assert_eq!(payload.id_cliente_externo, "whatsapp:+573001234567");
        assert!(payload.items_pedido.is_empty());
    }

    #[test]
    fn delivery_details_become_an_item() {
        let mut session = UserSession::new();
        merge_extracted(
            &mut session,
            &extracted(&[
                ("tipo_servicio", "domicilio"),
                ("nombre_usuario", "Ana"),
                ("destino", "calle 5"),
                ("metodo_pago", "efectivo"),
                ("detalles_adicionales", "una pizza"),
            ]),
        );

        let payload = build_order_payload(&session, "whatsapp:+573000000001", None);
        assert_eq!(payload.items_pedido.len(), 1);
        assert_eq!(payload.items_pedido[0].nombre_item, "una pizza");
        assert_eq!(payload.items_pedido[0].cantidad, 1);
    }

    #[test]
    fn amount_parsing() {
        assert_eq!(parse_amount("$25.000 pesos"), Some(25.000));
        assert_eq!(parse_amount("15000"), Some(15000.0));
        assert_eq!(parse_amount("gratis"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn profile_name_is_the_fallback_client_name() {
        let mut session = UserSession::new();
        merge_extracted(
            &mut session,
            &extracted(&[
                ("tipo_servicio", "otro"),
                ("detalles_adicionales", "llevar unas llaves"),
                ("metodo_pago", "nequi"),
            ]),
        );
        let payload = build_order_payload(&session, "whatsapp:+573000000002", Some("Pedro"));
        assert_eq!(payload.nombre_cliente.as_deref(), Some("Pedro"));
    }
}

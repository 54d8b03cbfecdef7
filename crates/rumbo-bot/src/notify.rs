//! The outbound leg: assignment notifications back to the client.
//!
//! Best-effort by design — the event is acked whether or not the provider
//! accepted the message; a failed send is a log line, not a redelivery
//! loop.

use std::sync::Arc;

use async_trait::async_trait;
use rumbo_broker::{HandlerError, MessageHandler};
use rumbo_core::ClientNotificationEvent;
use tracing::{error, info};

use crate::outbound::{ChatSender, sanitize_message};

/// Consumes `cola_notificaciones_cliente_bot`.
pub struct NotificationHandler {
    sender: Arc<dyn ChatSender>,
}

impl NotificationHandler {
    /// Build the handler over the chat-send effect.
    #[must_use]
    pub fn new(sender: Arc<dyn ChatSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl MessageHandler for NotificationHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        let event: ClientNotificationEvent = serde_json::from_slice(payload)
            .map_err(|parse_error| HandlerError::Malformed(parse_error.to_string()))?;

        let Some(recipient) = event.id_cliente_externo.as_deref().filter(|id| !id.is_empty())
        else {
            error!(order_id = %event.id_pedido, "notification event without client id");
            return Ok(());
        };

        let body = sanitize_message(&event.mensaje_para_cliente);
        if body.is_empty() {
            error!(order_id = %event.id_pedido, "notification event without message");
            return Ok(());
        }

        let delivered = self.sender.send(recipient, &body).await;
        info!(
            order_id = %event.id_pedido,
            delivered,
            "client notification processed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for NotificationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumbo_core::{DriverId, OrderId, OrderStatus, ServiceType};
    use std::sync::Mutex;

    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        accept: bool,
    }

    #[async_trait]
    impl ChatSender for RecordingSender {
        async fn send(&self, to: &str, body: &str) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            self.accept
        }
    }

    fn event(client: Option<&str>, message: &str) -> Vec<u8> {
        serde_json::to_vec(&ClientNotificationEvent {
            id_pedido: OrderId::new(),
            id_cliente_externo: client.map(String::from),
            nombre_cliente: Some("Juan".to_string()),
            tipo_servicio: ServiceType::Mototaxi,
            estado_actual_pedido: OrderStatus::AsignadoConductor,
            id_conductor_asignado: DriverId::new(),
            nombre_conductor_asignado: Some("Carlos".to_string()),
            placa_vehiculo_conductor: Some("ABC123".to_string()),
            mensaje_para_cliente: message.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sends_sanitized_notification() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            accept: true,
        });
        let handler = NotificationHandler::new(Arc::clone(&sender) as Arc<dyn ChatSender>);

        handler
            .handle(&event(Some("whatsapp:+573001234567"), "  tu conductor va en camino  "))
            .await
            .unwrap();

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "whatsapp:+573001234567");
        assert_eq!(sent[0].1, "tu conductor va en camino");
    }

    #[tokio::test]
    async fn missing_client_id_is_acked_without_sending() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            accept: true,
        });
        let handler = NotificationHandler::new(Arc::clone(&sender) as Arc<dyn ChatSender>);

        handler.handle(&event(None, "mensaje")).await.unwrap();
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_still_acks() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            accept: false,
        });
        let handler = NotificationHandler::new(Arc::clone(&sender) as Arc<dyn ChatSender>);

        // The send is attempted, fails, and the delivery is still Ok (ack).
        handler
            .handle(&event(Some("whatsapp:+573000000000"), "mensaje"))
            .await
            .unwrap();
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_event_is_dead_lettered() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            accept: true,
        });
        let handler = NotificationHandler::new(sender as Arc<dyn ChatSender>);

        assert!(matches!(
            handler.handle(b"not json").await,
            Err(HandlerError::Malformed(_))
        ));
    }
}

//! Named channels and their idempotent declaration.
//!
//! Every `(exchange, queue, routing_key)` tuple the platform uses is listed
//! here as a [`ChannelSpec`] constant. Declaration always wires the
//! dead-letter pair first, so a queue can never exist without its DLX:
//! messages nacked without requeue land on `<queue>_dlx` for human
//! inspection instead of looping forever.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{Channel, ExchangeKind};
use tracing::debug;

use crate::error::BrokerError;

/// One named channel: a direct exchange, a durable queue, and the routing
/// key binding them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Exchange name.
    pub exchange: &'static str,
    /// Queue name.
    pub queue: &'static str,
    /// Routing key.
    pub routing_key: &'static str,
}

/// Inbound chat messages awaiting dialogue processing.
pub const INCOMING_MESSAGES: ChannelSpec = ChannelSpec {
    exchange: "incoming_messages_exchange",
    queue: "incoming_messages",
    routing_key: "message.incoming",
};

/// Completed order payloads from the bot (or the REST API path).
pub const NEW_ORDERS: ChannelSpec = ChannelSpec {
    exchange: "pedidos_exchange",
    queue: "cola_pedidos_nuevos",
    routing_key: "pedido.nuevo",
};

/// Dispatch events fanned out to candidate drivers.
pub const MOTOTAXI_DISPATCH: ChannelSpec = ChannelSpec {
    exchange: "dispatch_exchange",
    queue: "cola_despacho_mototaxis",
    routing_key: "pedido.requiere_mototaxi",
};

/// Driver acceptances flowing back to the orders service.
pub const ORDER_UPDATES: ChannelSpec = ChannelSpec {
    exchange: "dispatch_exchange",
    queue: "cola_actualizaciones_pedido",
    routing_key: "pedido.conductor_acepto",
};

/// Assignment notifications for the chat outbound leg.
pub const CLIENT_NOTIFICATIONS: ChannelSpec = ChannelSpec {
    exchange: "dispatch_exchange",
    queue: "cola_notificaciones_cliente_bot",
    routing_key: "pedido.asignado_notificar_cliente",
};

/// Assignment confirmations consumed by the driver service watchdog.
///
/// Same routing key as [`CLIENT_NOTIFICATIONS`]; the direct exchange copies
/// each assignment event into both queues.
pub const DISPATCH_CONFIRMATIONS: ChannelSpec = ChannelSpec {
    exchange: "dispatch_exchange",
    queue: "cola_confirmaciones_despacho",
    routing_key: "pedido.asignado_notificar_cliente",
};

impl ChannelSpec {
    /// Dead-letter exchange paired with this channel's exchange.
    #[must_use]
    pub fn dlx_exchange(&self) -> String {
        format!("{}_dlx", self.exchange)
    }

    /// Dead-letter queue paired with this channel's queue.
    #[must_use]
    pub fn dlx_queue(&self) -> String {
        format!("{}_dlx", self.queue)
    }

    /// Routing key for dead-lettered messages.
    #[must_use]
    pub fn dlx_routing_key(&self) -> String {
        format!("{}.dead", self.routing_key)
    }

    /// Declare the exchange, queue, binding and dead-letter pair.
    ///
    /// Declaration is idempotent: all entities are durable and re-declaring
    /// with identical arguments is a no-op at the broker.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Amqp`] if any declaration fails.
    pub async fn declare(&self, channel: &Channel) -> Result<(), BrokerError> {
        let dlx_exchange = self.dlx_exchange();
        let dlx_queue = self.dlx_queue();
        let dlx_routing_key = self.dlx_routing_key();

        let durable = ExchangeDeclareOptions {
            durable: true,
            ..ExchangeDeclareOptions::default()
        };

        channel
            .exchange_declare(
                dlx_exchange.as_str(),
                ExchangeKind::Direct,
                durable,
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(
                dlx_queue.as_str(),
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                dlx_queue.as_str(),
                dlx_exchange.as_str(),
                dlx_routing_key.as_str(),
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        channel
            .exchange_declare(
                self.exchange,
                ExchangeKind::Direct,
                durable,
                FieldTable::default(),
            )
            .await?;

        let mut args = FieldTable::default();
        args.insert(
            ShortString::from("x-dead-letter-exchange"),
            AMQPValue::LongString(LongString::from(dlx_exchange.as_str())),
        );
        args.insert(
            ShortString::from("x-dead-letter-routing-key"),
            AMQPValue::LongString(LongString::from(dlx_routing_key.as_str())),
        );
        channel
            .queue_declare(
                self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                args,
            )
            .await?;
        channel
            .queue_bind(
                self.queue,
                self.exchange,
                self.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        debug!(
            exchange = self.exchange,
            queue = self.queue,
            routing_key = self.routing_key,
            "channel declared"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ChannelSpec; 6] = [
        INCOMING_MESSAGES,
        NEW_ORDERS,
        MOTOTAXI_DISPATCH,
        ORDER_UPDATES,
        CLIENT_NOTIFICATIONS,
        DISPATCH_CONFIRMATIONS,
    ];

    #[test]
    fn dlx_naming() {
        assert_eq!(NEW_ORDERS.dlx_exchange(), "pedidos_exchange_dlx");
        assert_eq!(NEW_ORDERS.dlx_queue(), "cola_pedidos_nuevos_dlx");
        assert_eq!(NEW_ORDERS.dlx_routing_key(), "pedido.nuevo.dead");
    }

    #[test]
    fn every_channel_has_a_dlx_pair() {
        for spec in ALL {
            assert!(spec.dlx_exchange().ends_with("_dlx"));
            assert!(spec.dlx_queue().ends_with("_dlx"));
            assert!(spec.dlx_routing_key().ends_with(".dead"));
        }
    }

    #[test]
    fn queue_names_are_unique() {
        for (i, a) in ALL.iter().enumerate() {
            for b in &ALL[i + 1..] {
                assert_ne!(a.queue, b.queue, "duplicate queue name");
            }
        }
    }

    #[test]
    fn confirmation_queue_shares_routing_key_with_notifications() {
        assert_eq!(
            DISPATCH_CONFIRMATIONS.routing_key,
            CLIENT_NOTIFICATIONS.routing_key
        );
        assert_eq!(DISPATCH_CONFIRMATIONS.exchange, CLIENT_NOTIFICATIONS.exchange);
    }
}

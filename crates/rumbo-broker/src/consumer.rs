//! Reconnecting consumer loop.
//!
//! Each consumer owns a dedicated connection and channel (never shared with
//! a publisher), prefetches one delivery at a time, and hands bodies to a
//! [`MessageHandler`]. Handler failure nacks without requeue, which routes
//! the delivery to the channel's DLX. Connection loss triggers an
//! exponential reconnect; unacked deliveries are redelivered by the broker.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};

use crate::config::BrokerConfig;
use crate::topology::ChannelSpec;

const RECONNECT_BASE: Duration = Duration::from_secs(2);
const RECONNECT_CAP: Duration = Duration::from_secs(60);

/// Why a handler rejected a delivery.
///
/// Either way the delivery is dead-lettered; the kinds exist for logging.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The body could not be decoded; retrying can never help.
    #[error("malformed delivery: {0}")]
    Malformed(String),
    /// Processing failed for a reason a human should look at.
    #[error("processing failed: {0}")]
    Failed(String),
}

/// Processes one delivery body.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a single delivery.
    ///
    /// # Errors
    ///
    /// Returning any [`HandlerError`] nacks the delivery without requeue,
    /// sending it to the dead-letter queue.
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError>;
}

/// Backoff delay for the given reconnect attempt (0-based).
fn backoff(attempt: u32) -> Duration {
    RECONNECT_BASE
        .saturating_mul(2_u32.saturating_pow(attempt))
        .min(RECONNECT_CAP)
}

/// Consume `spec`'s queue forever, dispatching deliveries to `handler`.
///
/// Runs as a long-lived task; connection failures are retried with capped
/// exponential backoff. The function only returns if the surrounding task
/// is cancelled.
pub async fn run(config: BrokerConfig, spec: ChannelSpec, handler: Arc<dyn MessageHandler>) {
    let uri = config.amqp_uri();
    let mut attempt: u32 = 0;

    loop {
        match consume_once(&uri, &spec, handler.as_ref()).await {
            Ok(()) => {
                // Stream ended without an error: the broker closed us.
                warn!(queue = spec.queue, "consumer stream ended, reconnecting");
            },
            Err(error) => {
                warn!(queue = spec.queue, %error, "consumer connection lost");
            },
        }
        let delay = backoff(attempt);
        attempt = attempt.saturating_add(1);
        warn!(queue = spec.queue, delay_secs = delay.as_secs(), "reconnecting");
        sleep(delay).await;
    }
}

/// One connection lifetime: connect, declare, consume until the stream dies.
async fn consume_once(
    uri: &str,
    spec: &ChannelSpec,
    handler: &dyn MessageHandler,
) -> Result<(), lapin::Error> {
    let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;

    spec.declare(&channel)
        .await
        .map_err(|declare_error| match declare_error {
            crate::error::BrokerError::Amqp(inner) => inner,
            other => {
                error!(queue = spec.queue, %other, "unexpected declare failure");
                lapin::Error::InvalidChannelState(lapin::ChannelState::Error)
            },
        })?;

    channel.basic_qos(1, BasicQosOptions::default()).await?;

    let mut consumer = channel
        .basic_consume(
            spec.queue,
            &format!("rumbo-{}", spec.queue),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(queue = spec.queue, "consumer started");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        match handler.handle(&delivery.data).await {
            Ok(()) => {
                if let Err(ack_error) = delivery.ack(BasicAckOptions::default()).await {
                    warn!(queue = spec.queue, %ack_error, "failed to ack delivery");
                }
            },
            Err(handler_error) => {
                error!(
                    queue = spec.queue,
                    routing_key = %delivery.routing_key,
                    redelivered = delivery.redelivered,
                    %handler_error,
                    "delivery rejected, dead-lettering"
                );
                let nack = BasicNackOptions {
                    requeue: false,
                    ..BasicNackOptions::default()
                };
                if let Err(nack_error) = delivery.nack(nack).await {
                    warn!(queue = spec.queue, %nack_error, "failed to nack delivery");
                }
            },
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff(0), Duration::from_secs(2));
        assert_eq!(backoff(1), Duration::from_secs(4));
        assert_eq!(backoff(2), Duration::from_secs(8));
        assert_eq!(backoff(4), Duration::from_secs(32));
        assert_eq!(backoff(5), Duration::from_secs(60));
        assert_eq!(backoff(30), Duration::from_secs(60));
        assert_eq!(backoff(u32::MAX), Duration::from_secs(60));
    }
}

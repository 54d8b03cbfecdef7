//! Broker connection lifecycle and publishing.

use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::Serialize;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::topology::ChannelSpec;

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// An established broker connection with a publishing channel.
///
/// Constructed once at service init and passed by reference; there is no
/// module-scope connection state anywhere in the platform.
pub struct Broker {
    connection: Connection,
    channel: Channel,
}

impl Broker {
    /// Connect to the broker, retrying a few times before giving up.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connect`] when every attempt failed; services
    /// treat this at startup as unrecoverable (exit code 2).
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let uri = config.amqp_uri();
        let mut last_error = None;

        for attempt in 1..=CONNECT_ATTEMPTS {
            match Connection::connect(&uri, ConnectionProperties::default()).await {
                Ok(connection) => {
                    let channel = connection.create_channel().await?;
                    info!(host = %config.host, port = config.port, "broker connected");
                    return Ok(Self {
                        connection,
                        channel,
                    });
                },
                Err(error) => {
                    warn!(
                        attempt,
                        max_attempts = CONNECT_ATTEMPTS,
                        %error,
                        "broker connect attempt failed"
                    );
                    last_error = Some(error);
                    if attempt < CONNECT_ATTEMPTS {
                        sleep(CONNECT_RETRY_DELAY).await;
                    }
                },
            }
        }

        Err(BrokerError::Connect {
            attempts: CONNECT_ATTEMPTS,
            source: last_error.unwrap_or(lapin::Error::InvalidConnectionState(
                lapin::ConnectionState::Closed,
            )),
        })
    }

    /// Declare a channel's topology (exchange, queue, binding, DLX pair).
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Amqp`] if a declaration fails.
    pub async fn declare(&self, spec: &ChannelSpec) -> Result<(), BrokerError> {
        spec.declare(&self.channel).await
    }

    /// Publish a JSON body on a channel's exchange and routing key.
    ///
    /// Deliveries are persistent with `content-type=application/json`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Serialize`] for unencodable payloads and
    /// [`BrokerError::Amqp`] for transport failures.
    pub async fn publish_json<T: Serialize>(
        &self,
        spec: &ChannelSpec,
        payload: &T,
    ) -> Result<(), BrokerError> {
        let body = serde_json::to_vec(payload)?;
        self.channel
            .basic_publish(
                spec.exchange,
                spec.routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await?
            .await?;
        Ok(())
    }

    /// Close the connection (clean shutdown).
    pub async fn close(&self) {
        if let Err(error) = self.connection.close(0, "shutdown").await {
            warn!(%error, "error closing broker connection");
        }
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker").finish_non_exhaustive()
    }
}

//! Per-driver push channel registry.
//!
//! Maps driver ids to the sending half of their WebSocket connection. The
//! receiving half is drained by a writer task that owns the socket sink, so
//! every actual socket write happens on the async runtime — callers on any
//! task (broker consumers included) only enqueue.
//!
//! At most one entry per driver: a re-connect evicts the prior entry, which
//! closes the old writer's channel and ends its task.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rumbo_core::{DriverId, DriverPushMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Opaque token identifying one registration.
///
/// `unregister` only removes the entry when the token matches, so a slow
/// disconnect of an evicted connection can never remove its replacement.
pub type RegistrationToken = u64;

struct PushHandle {
    token: RegistrationToken,
    tx: mpsc::UnboundedSender<DriverPushMessage>,
}

/// Thread-safe registry of live driver push channels.
#[derive(Default)]
pub struct PushRegistry {
    connections: DashMap<DriverId, PushHandle>,
    next_token: AtomicU64,
}

impl PushRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver's push sender, evicting any prior entry.
    ///
    /// Returns the token to present at [`PushRegistry::unregister`].
    pub fn register(
        &self,
        driver_id: DriverId,
        tx: mpsc::UnboundedSender<DriverPushMessage>,
    ) -> RegistrationToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .connections
            .insert(driver_id, PushHandle { token, tx });
        if previous.is_some() {
            debug!(driver_id = %driver_id, "previous push channel evicted");
        }
        info!(
            driver_id = %driver_id,
            active_connections = self.connections.len(),
            "driver connected"
        );
        token
    }

    /// Remove a driver's entry iff the token matches; no-op otherwise.
    pub fn unregister(&self, driver_id: DriverId, token: RegistrationToken) {
        let removed = self
            .connections
            .remove_if(&driver_id, |_, handle| handle.token == token);
        if removed.is_some() {
            info!(
                driver_id = %driver_id,
                active_connections = self.connections.len(),
                "driver disconnected"
            );
        }
    }

    /// Enqueue a message for a driver.
    ///
    /// Returns `false` when the driver has no live channel. A closed
    /// channel (the writer task is gone) is treated as an implicit
    /// unregister: the stale entry is dropped.
    pub fn send(&self, driver_id: DriverId, message: DriverPushMessage) -> bool {
        let Some(handle) = self.connections.get(&driver_id) else {
            return false;
        };

        if handle.tx.send(message).is_err() {
            let token = handle.token;
            drop(handle);
            warn!(driver_id = %driver_id, "push channel closed, dropping registration");
            self.connections
                .remove_if(&driver_id, |_, stale| stale.token == token);
            return false;
        }
        true
    }

    /// Number of live channels.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }
}

impl std::fmt::Debug for PushRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRegistry")
            .field("connected", &self.connections.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack() -> DriverPushMessage {
        DriverPushMessage::ConnectionAck {
            message: "hola".to_string(),
        }
    }

    #[tokio::test]
    async fn send_to_unknown_driver_is_false() {
        let registry = PushRegistry::new();
        assert!(!registry.send(DriverId::new(), ack()));
    }

    #[tokio::test]
    async fn register_and_send() {
        let registry = PushRegistry::new();
        let driver = DriverId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(driver, tx);

        assert!(registry.send(driver, ack()));
        assert!(matches!(
            rx.recv().await,
            Some(DriverPushMessage::ConnectionAck { .. })
        ));
    }

    #[tokio::test]
    async fn reconnect_evicts_prior_entry() {
        let registry = PushRegistry::new();
        let driver = DriverId::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        registry.register(driver, tx1);
        registry.register(driver, tx2);
        assert_eq!(registry.connected_count(), 1);

        assert!(registry.send(driver, ack()));
        assert!(rx2.recv().await.is_some());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_requires_matching_token() {
        let registry = PushRegistry::new();
        let driver = DriverId::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let old_token = registry.register(driver, tx1);
        let new_token = registry.register(driver, tx2);

        // The evicted connection's late unregister must not remove the
        // replacement.
        registry.unregister(driver, old_token);
        assert_eq!(registry.connected_count(), 1);

        registry.unregister(driver, new_token);
        assert_eq!(registry.connected_count(), 0);
    }

    #[tokio::test]
    async fn closed_channel_is_implicitly_unregistered() {
        let registry = PushRegistry::new();
        let driver = DriverId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(driver, tx);
        drop(rx);

        assert!(!registry.send(driver, ack()));
        assert_eq!(registry.connected_count(), 0);
    }
}

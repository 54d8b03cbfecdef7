//! Rumbo Broker — the durable topic fabric between services.
//!
//! Wraps `lapin` with the three things every Rumbo service needs:
//!
//! - [`topology`]: the named exchange/queue/routing-key tuples and their
//!   idempotent declaration, dead-letter pair included.
//! - [`Broker`]: an explicit connection lifecycle object with persistent
//!   JSON publishing.
//! - [`consumer`]: a reconnecting consume loop that dispatches deliveries to
//!   a [`MessageHandler`] and dead-letters anything the handler rejects.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod topology;

pub use broker::Broker;
pub use config::BrokerConfig;
pub use consumer::{HandlerError, MessageHandler};
pub use error::BrokerError;
pub use topology::ChannelSpec;

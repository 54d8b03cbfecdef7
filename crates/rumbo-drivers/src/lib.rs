//! Rumbo Drivers — driver lifecycle, fan-out and acceptance.
//!
//! The service with the most moving parts: it consumes dispatch events and
//! fans them out over per-driver push channels, arbitrates the first-wins
//! acceptance race with a compare-and-set on driver availability, ingests
//! real-time locations over the same channels, and runs the watchdog that
//! un-sticks drivers who won the race at this service but lost it at the
//! orders service.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod accept;
pub mod api;
pub mod auth;
pub mod config;
pub mod confirmations;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod registry;
pub mod repo;
pub mod watchdog;
pub mod ws;

pub use config::DriversConfig;
pub use error::DriverError;
pub use registry::PushRegistry;

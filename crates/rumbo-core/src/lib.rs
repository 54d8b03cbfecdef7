//! Rumbo Core — shared vocabulary of the dispatch platform.
//!
//! Every service speaks the same wire language: opaque ids, the order
//! status/service-type token sets, and the JSON event bodies carried by the
//! broker. This crate holds exactly that shared surface and nothing else —
//! no I/O, no service logic.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod events;
pub mod ids;
pub mod order;

pub use events::{
    ClientNotificationEvent, DispatchEvent, DriverAcceptedEvent, DriverPushMessage,
    IncomingMessage, LocationData,
};
pub use ids::{DriverId, OrderId};
pub use order::{OrderItem, OrderPayload, OrderStatus, ServiceType, StatusParseError};

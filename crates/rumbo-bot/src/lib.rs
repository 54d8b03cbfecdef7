//! Rumbo Bot — the chat side of the dispatch platform.
//!
//! Two binaries share this crate:
//!
//! - `rumbo-bot-webhook`: validates inbound chat webhooks and enqueues them
//!   for async processing, answering the provider immediately.
//! - `rumbo-bot-worker`: the slot-filling dialogue engine that turns
//!   free-text (and voice) into structured orders, plus the outbound leg
//!   that delivers assignment notifications back to the client.
//!
//! Speech-to-text, field extraction and the chat send API are external
//! collaborators behind the [`transcribe::Transcriber`],
//! [`extract::Extractor`] and [`outbound::ChatSender`] seams.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod audio;
pub mod config;
pub mod dialogue;
pub mod extract;
pub mod messages;
pub mod notify;
pub mod outbound;
pub mod signature;
pub mod transcribe;
pub mod webhook;
pub mod worker;

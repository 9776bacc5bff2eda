//! Protocol types shared by the wabot daemon and its gateway.
//!
//! This crate provides:
//! - Network identities ([`jid`])
//! - Inbound envelopes and batches ([`message`])
//! - The closed set of session events ([`event`])
//! - Outbound content and send options ([`content`])
//! - Gateway JSON frames ([`frame`])
//! - Lifecycle states, disconnect reasons and close codes ([`types`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod content;
pub mod event;
pub mod frame;
pub mod jid;
pub mod message;
pub mod types;

pub use event::InboundEvent;
pub use jid::Jid;
pub use message::{MessageBatch, MessageEnvelope, MessageKey};
pub use types::{ConnectionState, DisconnectReason};

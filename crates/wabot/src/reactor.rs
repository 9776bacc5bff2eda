//! Automatic reactions and read receipts for ordinary chat messages.

use crate::config::Config;
use crate::effects::BestEffort;
use crate::error::SocketError;
use crate::metrics::counters;
use crate::pools::{self, MESSAGE_EMOJIS};
use crate::socket::MessagingSocket;
use rand::Rng;
use wabot_common::content::{OutboundContent, SendOptions};
use wabot_common::MessageEnvelope;

/// Reacts to `envelope` with `emoji` in the envelope's chat.
///
/// # Errors
///
/// Returns the socket error if the reaction cannot be sent.
pub async fn do_react(
    emoji: &str,
    envelope: &MessageEnvelope,
    socket: &dyn MessagingSocket,
) -> Result<(), SocketError> {
    socket
        .send_message(
            envelope.chat(),
            OutboundContent::react(emoji, envelope.key.clone()),
            SendOptions::default(),
        )
        .await
}

/// Which actions to take for one ordinary envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactorPlan {
    /// Reaction to send, if any.
    pub react: Option<&'static str>,
    /// Send a read receipt.
    pub read: bool,
}

/// Policy for ordinary inbound messages.
#[derive(Debug, Clone, Copy)]
pub struct MessageAutoReactor {
    react: bool,
    read: bool,
}

impl MessageAutoReactor {
    /// Reactor with explicit toggles.
    #[must_use]
    pub const fn new(react: bool, read: bool) -> Self {
        Self { react, read }
    }

    /// Reactor configured from `auto_react` and `auto_read`.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.auto_react, config.auto_read)
    }

    /// Decides what to do. Own messages and status updates are left alone.
    pub fn plan<R: Rng + ?Sized>(&self, envelope: &MessageEnvelope, rng: &mut R) -> ReactorPlan {
        if envelope.key.from_me || envelope.is_status_broadcast() {
            return ReactorPlan::default();
        }
        ReactorPlan {
            react: if self.react {
                pools::draw(MESSAGE_EMOJIS, rng)
            } else {
                None
            },
            read: self.read,
        }
    }

    /// Carries out `plan`: react first, then read.
    pub async fn execute(
        &self,
        plan: &ReactorPlan,
        envelope: &MessageEnvelope,
        socket: &dyn MessagingSocket,
    ) {
        if let Some(emoji) = plan.react {
            let _ = BestEffort::quietly("auto_react", do_react(emoji, envelope, socket)).await;
            counters::message_interactions_total("react");
        }
        if plan.read {
            let _ = BestEffort::quietly(
                "auto_read",
                socket.read_messages(std::slice::from_ref(&envelope.key)),
            )
            .await;
            counters::message_interactions_total("read");
        }
    }
}

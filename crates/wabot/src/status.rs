//! Automatic interactions with status updates.
//!
//! Viewing is the master switch: with `auto_status_seen` off nothing here
//! runs, whatever the like and reply toggles say. The three actions are
//! isolated from each other, so a failed read still lets the reaction and
//! the reply go out.

use crate::config::Config;
use crate::effects::BestEffort;
use crate::metrics::counters;
use crate::pools::{self, STATUS_EMOJIS, STATUS_REPLIES};
use crate::socket::MessagingSocket;
use rand::Rng;
use wabot_common::content::{OutboundContent, SendOptions};
use wabot_common::MessageEnvelope;

/// Which actions to take for one status envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusPlan {
    /// Send a read receipt.
    pub read: bool,
    /// Reaction to send, if any.
    pub react: Option<&'static str>,
    /// Reply to send, if any.
    pub reply: Option<&'static str>,
}

/// Outcome of each attempted action; `None` when the action was not planned.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StatusOutcome {
    /// Read receipt.
    pub read: Option<BestEffort>,
    /// Reaction.
    pub react: Option<BestEffort>,
    /// Reply.
    pub reply: Option<BestEffort>,
}

/// Policy for envelopes posted to the status broadcast chat.
#[derive(Debug, Clone, Copy)]
pub struct StatusInteractionEngine {
    seen: bool,
    like: bool,
    reply: bool,
}

impl StatusInteractionEngine {
    /// Engine with explicit toggles.
    #[must_use]
    pub const fn new(seen: bool, like: bool, reply: bool) -> Self {
        Self { seen, like, reply }
    }

    /// Engine configured from `auto_status_seen`, `auto_like` and `auto_status_reply`.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(
            config.auto_status_seen,
            config.auto_like,
            config.auto_status_reply,
        )
    }

    /// Whether this engine owns `envelope`.
    #[must_use]
    pub fn applies_to(&self, envelope: &MessageEnvelope) -> bool {
        self.seen && envelope.is_status_broadcast()
    }

    /// Decides what to do, drawing the reaction and reply from their pools.
    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> StatusPlan {
        if !self.seen {
            return StatusPlan::default();
        }
        StatusPlan {
            read: true,
            react: if self.like {
                pools::draw(STATUS_EMOJIS, rng)
            } else {
                None
            },
            reply: if self.reply {
                pools::draw(STATUS_REPLIES, rng)
            } else {
                None
            },
        }
    }

    /// Carries out `plan` for `envelope`.
    pub async fn execute(
        &self,
        plan: &StatusPlan,
        envelope: &MessageEnvelope,
        socket: &dyn MessagingSocket,
    ) -> StatusOutcome {
        let mut outcome = StatusOutcome::default();

        if plan.read {
            let result = BestEffort::quietly(
                "status_read",
                socket.read_messages(std::slice::from_ref(&envelope.key)),
            )
            .await;
            counters::status_interactions_total("read");
            outcome.read = Some(result);
        }

        if let Some(emoji) = plan.react {
            // Visible to the author and to ourselves only.
            let own = socket.decode_jid(&socket.user_id());
            let mut scope = Vec::with_capacity(2);
            if let Some(author) = &envelope.key.participant {
                scope.push(author.clone());
            }
            scope.push(own);

            let result = BestEffort::quietly(
                "status_react",
                socket.send_message(
                    envelope.chat(),
                    OutboundContent::react(emoji, envelope.key.clone()),
                    SendOptions::status_scope(scope),
                ),
            )
            .await;
            counters::status_interactions_total("react");
            outcome.react = Some(result);
        }

        if let Some(reply) = plan.reply {
            let result = BestEffort::quietly(
                "status_reply",
                socket.send_message(
                    envelope.origin(),
                    OutboundContent::text(reply),
                    SendOptions::quoting(envelope),
                ),
            )
            .await;
            counters::status_interactions_total("reply");
            outcome.reply = Some(result);
        }

        outcome
    }
}

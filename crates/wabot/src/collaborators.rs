//! Downstream consumers of routed events.
//!
//! Command execution, group-membership and call business logic live outside
//! this crate. The daemon wires the logging implementations below.

use crate::socket::MessagingSocket;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use wabot_common::event::{CallEvent, GroupParticipantsUpdate};
use wabot_common::MessageBatch;

/// Parses and executes commands found in inbound messages.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handles one batch. Errors are contained by the router.
    async fn handle(&self, batch: MessageBatch, socket: Arc<dyn MessagingSocket>)
        -> anyhow::Result<()>;
}

/// Reacts to group membership changes.
#[async_trait]
pub trait GroupUpdateHandler: Send + Sync {
    /// Handles one membership change.
    async fn on_group_update(
        &self,
        socket: Arc<dyn MessagingSocket>,
        update: GroupParticipantsUpdate,
    ) -> anyhow::Result<()>;
}

/// Reacts to incoming calls.
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// Handles one batch of call notifications.
    async fn on_call(&self, calls: Vec<CallEvent>, socket: Arc<dyn MessagingSocket>)
        -> anyhow::Result<()>;
}

/// Records every delivery at `debug` and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait]
impl CommandHandler for LoggingHandler {
    async fn handle(
        &self,
        batch: MessageBatch,
        _socket: Arc<dyn MessagingSocket>,
    ) -> anyhow::Result<()> {
        for envelope in &batch.messages {
            debug!(
                chat = %envelope.chat(),
                from = %envelope.origin(),
                text = envelope.text().unwrap_or_default(),
                "message delivered to command handler"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl GroupUpdateHandler for LoggingHandler {
    async fn on_group_update(
        &self,
        _socket: Arc<dyn MessagingSocket>,
        update: GroupParticipantsUpdate,
    ) -> anyhow::Result<()> {
        debug!(
            group = %update.id,
            action = ?update.action,
            participants = update.participants.len(),
            "group participants updated"
        );
        Ok(())
    }
}

#[async_trait]
impl CallHandler for LoggingHandler {
    async fn on_call(
        &self,
        calls: Vec<CallEvent>,
        _socket: Arc<dyn MessagingSocket>,
    ) -> anyhow::Result<()> {
        for call in &calls {
            debug!(from = %call.from, status = %call.status, video = call.is_video, "call event");
        }
        Ok(())
    }
}

/// The three downstream consumers the router feeds.
#[derive(Clone)]
pub struct Collaborators {
    /// Command handler.
    pub commands: Arc<dyn CommandHandler>,
    /// Group update handler.
    pub groups: Arc<dyn GroupUpdateHandler>,
    /// Call handler.
    pub calls: Arc<dyn CallHandler>,
}

impl Collaborators {
    /// Logging implementations for every consumer.
    #[must_use]
    pub fn logging() -> Self {
        Self {
            commands: Arc::new(LoggingHandler),
            groups: Arc::new(LoggingHandler),
            calls: Arc::new(LoggingHandler),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

//! Dispatch of inbound session events to policies and collaborators.
//!
//! Lifecycle updates belong to [`crate::lifecycle`]; everything else comes
//! through [`EventRouter::route`], usually from the session's routing task
//! (see [`EventRouter::spawn`]), which keeps events in arrival order. Each
//! event, and each envelope within a message batch, is processed inside its
//! own failure boundary: errors and panics are logged at `trace` and never
//! reach the caller.

use crate::collaborators::Collaborators;
use crate::credentials::CredentialStore;
use crate::error::EventError;
use crate::metrics::counters;
use crate::reactor::MessageAutoReactor;
use crate::socket::MessagingSocket;
use crate::status::StatusInteractionEngine;
use futures_util::FutureExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use wabot_common::message::BatchKind;
use wabot_common::{InboundEvent, MessageBatch, MessageEnvelope};

/// Where a single envelope went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeRoute {
    /// Control-only content; nothing downstream saw it.
    Filtered,
    /// Handled by the status engine.
    Status,
    /// Handled by the auto-reactor and then the command handler.
    Command,
}

/// Routes one session's events.
pub struct EventRouter {
    socket: Arc<dyn MessagingSocket>,
    store: CredentialStore,
    status: StatusInteractionEngine,
    reactor: MessageAutoReactor,
    collaborators: Collaborators,
    rng: Mutex<StdRng>,
}

impl EventRouter {
    /// Router for the session behind `socket`.
    pub fn new(
        socket: Arc<dyn MessagingSocket>,
        store: CredentialStore,
        status: StatusInteractionEngine,
        reactor: MessageAutoReactor,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            socket,
            store,
            status,
            reactor,
            collaborators,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeds the random draws, making reaction and reply choices repeatable.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Routes `events` one at a time until the channel closes.
    pub fn spawn(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<InboundEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.route(event).await;
            }
            trace!("routing channel closed");
        })
    }

    /// Routes one event. Never fails; see the module docs.
    pub async fn route(&self, event: InboundEvent) {
        let tag = event.tag();
        counters::events_routed_total(tag);
        match event {
            InboundEvent::Lifecycle(update) => {
                debug!(?update, "lifecycle update reached the router, ignoring");
            }
            InboundEvent::CredentialsUpdate(creds) => {
                contain(tag, async { Ok(self.store.save_creds(&creds)?) }).await;
            }
            InboundEvent::Messages(batch) => {
                self.route_batch(batch).await;
            }
            InboundEvent::Call(calls) => {
                let socket = self.socket.clone();
                contain(tag, async {
                    self.collaborators.calls.on_call(calls, socket).await?;
                    Ok(())
                })
                .await;
            }
            InboundEvent::GroupParticipants(update) => {
                let socket = self.socket.clone();
                contain(tag, async {
                    self.collaborators
                        .groups
                        .on_group_update(socket, update)
                        .await?;
                    Ok(())
                })
                .await;
            }
        }
    }

    /// Routes every envelope of `batch` in order and reports where each went.
    pub async fn route_batch(&self, batch: MessageBatch) -> Vec<EnvelopeRoute> {
        let kind = batch.kind;
        let mut routes = Vec::with_capacity(batch.messages.len());
        for envelope in batch.messages {
            let route = self.classify(&envelope);
            if route == EnvelopeRoute::Filtered {
                counters::envelopes_filtered_total();
                trace!(id = %envelope.key.id, "filtered control envelope");
            } else {
                contain("envelope", self.route_envelope(route, kind, envelope)).await;
            }
            routes.push(route);
        }
        routes
    }

    fn classify(&self, envelope: &MessageEnvelope) -> EnvelopeRoute {
        if envelope.is_control() {
            EnvelopeRoute::Filtered
        } else if self.status.applies_to(envelope) {
            EnvelopeRoute::Status
        } else {
            EnvelopeRoute::Command
        }
    }

    async fn route_envelope(
        &self,
        route: EnvelopeRoute,
        kind: BatchKind,
        envelope: MessageEnvelope,
    ) -> Result<(), EventError> {
        match route {
            EnvelopeRoute::Filtered => {}
            EnvelopeRoute::Status => {
                let plan = self.status.plan(&mut *self.lock_rng());
                self.status
                    .execute(&plan, &envelope, self.socket.as_ref())
                    .await;
            }
            EnvelopeRoute::Command => {
                let plan = self.reactor.plan(&envelope, &mut *self.lock_rng());
                self.reactor
                    .execute(&plan, &envelope, self.socket.as_ref())
                    .await;
                self.collaborators
                    .commands
                    .handle(MessageBatch::single(kind, envelope), self.socket.clone())
                    .await?;
            }
        }
        Ok(())
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("status", &self.status)
            .field("reactor", &self.reactor)
            .finish_non_exhaustive()
    }
}

/// Runs `work`, swallowing errors and panics.
async fn contain<F>(kind: &'static str, work: F)
where
    F: Future<Output = Result<(), EventError>>,
{
    let result = match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(EventError::Panicked),
    };
    if let Err(e) = result {
        counters::event_failures_total(kind);
        trace!(kind, error = %e, "event processing failed");
    }
}

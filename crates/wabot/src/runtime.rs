//! Top-level session loop.
//!
//! Runs the startup sequence (credential bootstrap, version fetch, open),
//! feeds lifecycle updates to the [`ConnectionLifecycleManager`] and every
//! other event to a per-session [`EventRouter`] task, and reopens after transient closes
//! under a [`ReconnectPolicy`]. The loop ends with a [`Shutdown`] value; the
//! binary turns it into an exit code.

use crate::backoff::ReconnectPolicy;
use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::BootstrapError;
use crate::lifecycle::{ConnectionLifecycleManager, LifecycleAction};
use crate::metrics::counters;
use crate::reactor::MessageAutoReactor;
use crate::router::EventRouter;
use crate::socket::{Session, SessionConnector};
use crate::status::StatusInteractionEngine;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use wabot_common::event::ConnectionUpdate;
use wabot_common::types::status_code;
use wabot_common::{ConnectionState, DisconnectReason, InboundEvent};

/// Why the runtime stopped.
#[derive(Debug)]
pub enum Shutdown {
    /// The startup sequence failed.
    Startup(BootstrapError),
    /// The session closed for a reason that forbids reopening.
    Disconnected(DisconnectReason),
    /// Too many consecutive reopens without reaching `open`.
    RetriesExhausted {
        /// Reopen attempts made.
        attempts: u32,
    },
}

impl Shutdown {
    /// Process exit code for this shutdown.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Startup(_) | Self::RetriesExhausted { .. } => 1,
            Self::Disconnected(_) => 0,
        }
    }

    /// Remediation hint shown to the operator, if any.
    #[must_use]
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::Startup(BootstrapError::Credentials(_)) => Some(
                "Create session.json containing { \"SESSION_ID\": \"<base64 session>\" } or set SESSION_ID.",
            ),
            Self::Startup(BootstrapError::Open(_)) => {
                Some("Check that the gateway is running and reachable.")
            }
            Self::Disconnected(DisconnectReason::AuthInvalid) => {
                Some("Invalid session, please delete the 'session' folder and restart.")
            }
            Self::Disconnected(DisconnectReason::LoggedOut) => {
                Some("Logged out, please delete the 'session' folder and restart.")
            }
            Self::Disconnected(_) => None,
            Self::RetriesExhausted { .. } => {
                Some("The session kept dropping; check network and gateway health.")
            }
        }
    }
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup(e) => write!(f, "startup failed: {e}"),
            Self::Disconnected(reason) => write!(f, "session ended: {reason}"),
            Self::RetriesExhausted { attempts } => {
                write!(f, "gave up after {attempts} reopen attempts")
            }
        }
    }
}

/// Owns everything needed to run sessions until a fatal condition.
pub struct Runtime<C> {
    config: Arc<Config>,
    store: CredentialStore,
    connector: C,
    collaborators: Collaborators,
    state_tx: watch::Sender<ConnectionState>,
    seed: Option<u64>,
}

impl<C: SessionConnector> Runtime<C> {
    /// Runtime publishing its connection state on `state_tx`.
    pub fn new(
        config: Arc<Config>,
        store: CredentialStore,
        connector: C,
        collaborators: Collaborators,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            config,
            store,
            connector,
            collaborators,
            state_tx,
            seed: None,
        }
    }

    /// Seeds every router's random draws.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    async fn start_session(&self) -> Result<Session, BootstrapError> {
        self.store.bootstrap()?;
        let auth = self.store.load_auth_state()?;
        let version = self.connector.fetch_version().await;
        info!(?version, "opening session");
        Ok(self.connector.open(auth, version).await?)
    }

    fn router_for(&self, session: &Session) -> EventRouter {
        let router = EventRouter::new(
            session.socket.clone(),
            self.store.clone(),
            StatusInteractionEngine::from_config(&self.config),
            MessageAutoReactor::from_config(&self.config),
            self.collaborators.clone(),
        );
        match self.seed {
            Some(seed) => router.with_seed(seed),
            None => router,
        }
    }

    /// Runs sessions until one ends fatally.
    pub async fn run(self) -> Shutdown {
        let mut lifecycle =
            ConnectionLifecycleManager::new(self.config.clone(), self.state_tx.clone());
        let mut policy = ReconnectPolicy::from_config(&self.config.reconnect);

        loop {
            lifecycle.begin_session();
            let session = match self.start_session().await {
                Ok(session) => session,
                Err(e) => {
                    error!(error = %e, "startup failed");
                    return Shutdown::Startup(e);
                }
            };

            let action = self.drive(session, &mut lifecycle, &mut policy).await;
            match action {
                LifecycleAction::Terminate(reason) => return Shutdown::Disconnected(reason),
                LifecycleAction::Reopen(reason) => {
                    let Some(delay) = policy.next_delay() else {
                        let attempts = policy.attempts();
                        error!(attempts, "reopen budget exhausted");
                        return Shutdown::RetriesExhausted { attempts };
                    };
                    counters::reconnects_total();
                    info!(
                        %reason,
                        attempt = policy.attempts(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "reopening session"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                LifecycleAction::Continue | LifecycleAction::Opened => {}
            }
        }
    }

    /// Processes one session's events until it closes.
    ///
    /// Lifecycle updates and credential writes are handled here. All other
    /// events go in arrival order to a routing task owned by this session,
    /// so a slow handler never delays a close. The task is aborted when the
    /// session ends.
    async fn drive(
        &self,
        session: Session,
        lifecycle: &mut ConnectionLifecycleManager,
        policy: &mut ReconnectPolicy,
    ) -> LifecycleAction {
        let router = Arc::new(self.router_for(&session));
        let Session { socket, mut events } = session;
        let (route_tx, route_rx) = mpsc::unbounded_channel();
        let routing = router.clone().spawn(route_rx);

        let action = loop {
            let Some(event) = events.recv().await else {
                // Stream ended without a close update; same as a dropped link.
                warn!("session event stream ended");
                let closed = ConnectionUpdate::closed(Some(status_code::CONNECTION_CLOSED));
                break lifecycle.on_update(&closed, &socket).await;
            };
            match event {
                InboundEvent::Lifecycle(update) => {
                    match lifecycle.on_update(&update, &socket).await {
                        LifecycleAction::Opened => policy.reset(),
                        LifecycleAction::Continue => {}
                        action => break action,
                    }
                }
                event @ InboundEvent::CredentialsUpdate(_) => router.route(event).await,
                other => {
                    if route_tx.send(other).is_err() {
                        debug!("routing task gone, dropping event");
                    }
                }
            }
        };

        routing.abort();
        action
    }
}

impl<C> fmt::Debug for Runtime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CredentialError, SocketError};

    #[test]
    fn exit_codes() {
        assert_eq!(
            Shutdown::Startup(BootstrapError::Credentials(CredentialError::InvalidEncoding))
                .exit_code(),
            1
        );
        assert_eq!(Shutdown::RetriesExhausted { attempts: 3 }.exit_code(), 1);
        assert_eq!(Shutdown::Disconnected(DisconnectReason::Replaced).exit_code(), 0);
    }

    #[test]
    fn fatal_disconnects_carry_guidance() {
        assert!(Shutdown::Disconnected(DisconnectReason::LoggedOut)
            .guidance()
            .unwrap()
            .contains("delete the 'session' folder"));
        assert!(Shutdown::Disconnected(DisconnectReason::Replaced)
            .guidance()
            .is_none());
        assert!(Shutdown::Startup(BootstrapError::Open(SocketError::Closed))
            .guidance()
            .is_some());
    }
}

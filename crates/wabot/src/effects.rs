//! Best-effort side effects.
//!
//! Group joins, announcement sends and mode updates must never fail the
//! caller. Their outcome is returned as a [`BestEffort`] value that callers
//! may inspect or ignore; failures are logged here and never retried.

use crate::error::SocketError;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Outcome of a side effect whose failure is tolerated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum BestEffort {
    /// The effect completed.
    Completed,
    /// The effect failed; the failure has been logged.
    Failed(SocketError),
}

impl BestEffort {
    /// Runs `effect`, logging a failure at `warn` under `label`.
    pub async fn attempt<T, F>(label: &'static str, effect: F) -> Self
    where
        F: Future<Output = Result<T, SocketError>>,
    {
        match effect.await {
            Ok(_) => {
                debug!(effect = label, "side effect completed");
                Self::Completed
            }
            Err(e) => {
                warn!(effect = label, error = %e, "side effect failed");
                Self::Failed(e)
            }
        }
    }

    /// Like [`BestEffort::attempt`] but logs failures at `trace`, for
    /// per-event actions whose failure is routine.
    pub async fn quietly<T, F>(label: &'static str, effect: F) -> Self
    where
        F: Future<Output = Result<T, SocketError>>,
    {
        match effect.await {
            Ok(_) => Self::Completed,
            Err(e) => {
                trace!(effect = label, error = %e, "side effect failed");
                Self::Failed(e)
            }
        }
    }

    /// Whether the effect completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Runs `effect` on a detached task. The handle is only useful to tests.
pub fn detach<T, F>(label: &'static str, effect: F) -> JoinHandle<BestEffort>
where
    T: Send + 'static,
    F: Future<Output = Result<T, SocketError>> + Send + 'static,
{
    tokio::spawn(BestEffort::attempt(label, effect))
}

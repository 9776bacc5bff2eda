//! wabot daemon: persistent messaging session with status auto-view,
//! auto-react and command dispatch.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Reopen pacing with exponential backoff, jitter and a retry budget.
pub mod backoff;
/// Downstream command, group and call consumers.
pub mod collaborators;
/// CLI parsing and layered configuration.
pub mod config;
/// Session credential bootstrap and persistence.
pub mod credentials;
/// Best-effort side effects.
pub mod effects;
/// Error types.
pub mod error;
/// WebSocket client for the messaging gateway.
pub mod gateway;
/// HTTP liveness, health and metrics endpoints.
pub mod health;
/// Connection lifecycle state machine.
pub mod lifecycle;
/// Prometheus counters.
pub mod metrics;
/// Greeting, time and decorative font helpers.
pub mod presentation;
/// Curated random-draw pools.
pub mod pools;
/// Auto-react and auto-read for ordinary messages.
pub mod reactor;
/// Event dispatch.
pub mod router;
/// Top-level session loop.
pub mod runtime;
/// Messaging-socket and connector traits.
pub mod socket;
/// Status update interactions.
pub mod status;
/// Latest client version lookup.
pub mod version;

//! Error types for credential bootstrap, the gateway and event routing.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning the externally supplied credential into session files.
///
/// Every variant is fatal to startup.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The credential source file does not exist and no override is set.
    #[error("credential source {} not found", .0.display())]
    MissingSource(PathBuf),
    /// The credential source exists but cannot be read or parsed.
    #[error("credential source {} is unreadable: {reason}", .path.display())]
    MalformedSource {
        /// Source file.
        path: PathBuf,
        /// Read or parse error.
        reason: String,
    },
    /// `SESSION_ID` is missing, empty or still the placeholder.
    #[error("SESSION_ID is missing, empty or a placeholder")]
    InvalidEncoding,
    /// Decoding the credential or writing the session directory failed.
    #[error("failed to persist credentials: {0}")]
    PersistFailure(String),
}

/// Failures of the messaging-socket collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// Transport could not be established.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The gateway refused the session.
    #[error("session rejected: {message}")]
    Rejected {
        /// Reason reported by the gateway.
        message: String,
        /// Network status code, when known.
        status_code: Option<u16>,
    },
    /// A request completed with an error.
    #[error("request {method} failed: {message}")]
    Request {
        /// Method name.
        method: String,
        /// Reason reported by the gateway.
        message: String,
    },
    /// A request did not complete in time.
    #[error("request {0} timed out")]
    Timeout(String),
    /// The session is no longer connected.
    #[error("session closed")]
    Closed,
}

/// Failures of the startup sequence. All of them terminate the process.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Credential bootstrap failed.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    /// Opening the session failed.
    #[error("failed to open session: {0}")]
    Open(#[from] SocketError),
}

/// Failure while processing a single inbound event. Always contained.
#[derive(Error, Debug)]
pub enum EventError {
    /// A collaborator call failed.
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// Persisting updated credentials failed.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    /// A downstream handler reported an error.
    #[error("handler failed: {0}")]
    Handler(#[from] anyhow::Error),
    /// Processing panicked.
    #[error("event processing panicked")]
    Panicked,
}

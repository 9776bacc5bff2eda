//! Connection lifecycle types and gateway protocol constants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire protocol identifier sent in the `connect` request.
pub const PROTOCOL_VERSION: &str = "wabot.v1";

/// Browser triple announced to the network on connect.
pub const BROWSER: [&str; 3] = ["wabot", "Chrome", "1.0.0"];

/// Client protocol version used when the latest one cannot be fetched.
pub const DEFAULT_CLIENT_VERSION: [u32; 3] = [2, 3000, 1_023_223_821];

/// Status codes carried by `closed` lifecycle updates.
///
/// The numeric values follow the messaging network's close codes.
pub mod status_code {
    /// Credentials are present but unusable.
    pub const BAD_SESSION: u16 = 500;
    /// The socket was closed by the network.
    pub const CONNECTION_CLOSED: u16 = 428;
    /// The link dropped or a request timed out.
    pub const CONNECTION_LOST: u16 = 408;
    /// Another client opened a session with the same credentials.
    pub const CONNECTION_REPLACED: u16 = 440;
    /// The device was unlinked from the account.
    pub const LOGGED_OUT: u16 = 401;
    /// The network asks the client to reconnect.
    pub const RESTART_REQUIRED: u16 = 515;
    /// Alias of [`CONNECTION_LOST`]; the network reuses the code.
    pub const TIMED_OUT: u16 = CONNECTION_LOST;
}

/// State of the messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport or authentication in progress.
    Connecting,
    /// Session authenticated and usable.
    Open,
    /// Session closed; see the accompanying [`DisconnectReason`].
    Closed,
}

impl ConnectionState {
    /// Lowercase label used in logs and the health endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed classification of why a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Stored credentials were rejected.
    AuthInvalid,
    /// Recoverable loss of the connection.
    Transient,
    /// Another client took over the session.
    Replaced,
    /// The device was logged out remotely.
    LoggedOut,
    /// Any code outside the known set, or no code at all.
    Unknown,
}

impl DisconnectReason {
    /// Maps a collaborator close code into the closed set.
    #[must_use]
    pub const fn from_status_code(code: Option<u16>) -> Self {
        match code {
            Some(status_code::BAD_SESSION) => Self::AuthInvalid,
            Some(
                status_code::CONNECTION_CLOSED
                | status_code::CONNECTION_LOST
                | status_code::RESTART_REQUIRED,
            ) => Self::Transient,
            Some(status_code::CONNECTION_REPLACED) => Self::Replaced,
            Some(status_code::LOGGED_OUT) => Self::LoggedOut,
            _ => Self::Unknown,
        }
    }

    /// Whether this reason ends the process instead of reopening.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::AuthInvalid | Self::Replaced | Self::LoggedOut)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthInvalid => "auth_invalid",
            Self::Transient => "transient",
            Self::Replaced => "replaced",
            Self::LoggedOut => "logged_out",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

//! Chat and user identities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved chat identity under which status updates are broadcast.
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// A network identity of the form `user[:device]@server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Wraps a raw identity string without validation.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The status broadcast chat.
    #[must_use]
    pub fn status_broadcast() -> Self {
        Self(STATUS_BROADCAST.to_string())
    }

    /// Raw identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the reserved status broadcast chat.
    #[must_use]
    pub fn is_status_broadcast(&self) -> bool {
        self.0 == STATUS_BROADCAST
    }

    /// Strips the device suffix: `123:4@s.whatsapp.net` becomes
    /// `123@s.whatsapp.net`. Identities without a device suffix are
    /// returned unchanged.
    #[must_use]
    pub fn decode(&self) -> Self {
        match self.0.split_once('@') {
            Some((local, server)) if local.contains(':') => {
                let user = local.split_once(':').map_or(local, |(u, _)| u);
                Self(format!("{user}@{server}"))
            }
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Jid {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Jid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

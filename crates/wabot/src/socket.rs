//! Seams to the messaging-socket collaborator.
//!
//! [`SessionConnector`] opens sessions; [`MessagingSocket`] is the handle
//! every policy acts through. The gateway client in [`crate::gateway`]
//! implements both; tests substitute recording mocks.

use crate::credentials::AuthState;
use crate::error::SocketError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use wabot_common::content::{OutboundContent, SendOptions};
use wabot_common::{InboundEvent, Jid, MessageKey};

/// Client protocol version triple.
pub type ClientVersion = [u32; 3];

/// Operations available on an open session.
#[async_trait]
pub trait MessagingSocket: Send + Sync {
    /// Identity this session is logged in as.
    fn user_id(&self) -> Jid;

    /// Normalises an identity, stripping any device suffix.
    fn decode_jid(&self, jid: &Jid) -> Jid {
        jid.decode()
    }

    /// Sends `content` to `to`.
    async fn send_message(
        &self,
        to: &Jid,
        content: OutboundContent,
        options: SendOptions,
    ) -> Result<(), SocketError>;

    /// Marks the given messages as read.
    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), SocketError>;

    /// Joins the group behind an invite code, returning its identity.
    async fn group_accept_invite(&self, code: &str) -> Result<Jid, SocketError>;

    /// Sets whether commands from anyone (not only the owner) are accepted.
    async fn set_public(&self, public: bool) -> Result<(), SocketError>;
}

/// A freshly opened session: its handle and its event stream.
pub struct Session {
    /// Shared session handle.
    pub socket: Arc<dyn MessagingSocket>,
    /// Inbound events in emission order. Closing the channel ends the session.
    pub events: mpsc::Receiver<InboundEvent>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.socket.user_id())
            .finish_non_exhaustive()
    }
}

/// Opens sessions against the messaging network.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Latest client protocol version, or a built-in default on failure.
    async fn fetch_version(&self) -> ClientVersion;

    /// Opens a session with the stored credentials.
    async fn open(&self, auth: AuthState, version: ClientVersion) -> Result<Session, SocketError>;
}

#[async_trait]
impl<T: SessionConnector + ?Sized> SessionConnector for Arc<T> {
    async fn fetch_version(&self) -> ClientVersion {
        (**self).fetch_version().await
    }

    async fn open(&self, auth: AuthState, version: ClientVersion) -> Result<Session, SocketError> {
        (**self).open(auth, version).await
    }
}

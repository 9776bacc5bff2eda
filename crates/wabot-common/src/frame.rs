//! Gateway JSON frame serialization and parsing.
//!
//! Each WebSocket text message carries exactly one frame. The `type` field
//! selects the variant: `req` (client → gateway), `res` (gateway → client,
//! answering a `req` with the same `id`) and `event` (gateway → client,
//! unsolicited).

use crate::event::{CallEvent, ConnectionUpdate, GroupParticipantsUpdate, InboundEvent};
use crate::message::MessageBatch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Request method names understood by the gateway.
pub mod method {
    /// Open the session with stored credentials.
    pub const CONNECT: &str = "connect";
    /// Send a message or reaction.
    pub const SEND_MESSAGE: &str = "sendMessage";
    /// Mark messages as read.
    pub const READ_MESSAGES: &str = "readMessages";
    /// Join a group through an invite code.
    pub const GROUP_ACCEPT_INVITE: &str = "groupAcceptInvite";
    /// Set the public/private presence mode.
    pub const SET_PRESENCE_MODE: &str = "setPresenceMode";
}

/// Event names emitted by the gateway.
pub mod event_name {
    /// Lifecycle transitions.
    pub const CONNECTION_UPDATE: &str = "connection.update";
    /// Authentication material changed.
    pub const CREDS_UPDATE: &str = "creds.update";
    /// Messages arrived.
    pub const MESSAGES_UPSERT: &str = "messages.upsert";
    /// Incoming calls.
    pub const CALL: &str = "call";
    /// Group membership changed.
    pub const GROUP_PARTICIPANTS_UPDATE: &str = "group-participants.update";
}

/// Maximum accepted frame size in bytes.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Errors from frame parsing.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Frame exceeds [`MAX_FRAME_SIZE`].
    #[error("frame too large: {0} bytes")]
    TooLarge(usize),
    /// Frame is not valid JSON or has the wrong shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Event payload does not match the event name.
    #[error("invalid payload for event {event}: {source}")]
    InvalidPayload {
        /// Event name.
        event: String,
        /// Underlying decode error.
        source: serde_json::Error,
    },
}

/// Error body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable reason.
    pub message: String,
    /// Optional network status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// A parsed gateway frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Client request.
    Req {
        /// Correlation id echoed by the response.
        id: String,
        /// Method name, see [`method`].
        method: String,
        /// Method parameters.
        #[serde(default)]
        params: Value,
    },
    /// Gateway response.
    Res {
        /// Id of the answered request.
        id: String,
        /// Whether the request succeeded.
        ok: bool,
        /// Result payload.
        #[serde(default)]
        payload: Value,
        /// Failure details when `ok` is false.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorBody>,
    },
    /// Unsolicited gateway event.
    Event {
        /// Event name, see [`event_name`].
        event: String,
        /// Event payload.
        #[serde(default)]
        payload: Value,
    },
}

impl Frame {
    /// Builds a request frame.
    pub fn request(id: impl Into<String>, method: &str, params: Value) -> Self {
        Self::Req {
            id: id.into(),
            method: method.to_string(),
            params,
        }
    }

    /// Builds a successful response frame.
    pub fn ok(id: impl Into<String>, payload: Value) -> Self {
        Self::Res {
            id: id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Builds a failed response frame.
    pub fn err(id: impl Into<String>, message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Res {
            id: id.into(),
            ok: false,
            payload: Value::Null,
            error: Some(ErrorBody {
                message: message.into(),
                status_code,
            }),
        }
    }

    /// Builds an event frame.
    pub fn event(name: &str, payload: Value) -> Self {
        Self::Event {
            event: name.to_string(),
            payload,
        }
    }

    /// Parses one frame from a WebSocket text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is oversized or not a valid frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        if text.len() > MAX_FRAME_SIZE {
            return Err(FrameError::TooLarge(text.len()));
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the frame to its JSON text form.
    #[must_use]
    pub fn serialize(&self) -> String {
        // Serializing these plain data types cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Decodes an event frame body into an [`InboundEvent`].
///
/// Unknown event names yield `Ok(None)` so newer gateways can add events
/// without breaking older clients.
///
/// # Errors
///
/// Returns [`FrameError::InvalidPayload`] if a known event carries a payload
/// of the wrong shape.
pub fn decode_event(name: &str, payload: Value) -> Result<Option<InboundEvent>, FrameError> {
    let invalid = |source| FrameError::InvalidPayload {
        event: name.to_string(),
        source,
    };
    let event = match name {
        event_name::CONNECTION_UPDATE => InboundEvent::Lifecycle(
            serde_json::from_value::<ConnectionUpdate>(payload).map_err(invalid)?,
        ),
        event_name::CREDS_UPDATE => InboundEvent::CredentialsUpdate(payload),
        event_name::MESSAGES_UPSERT => {
            InboundEvent::Messages(serde_json::from_value::<MessageBatch>(payload).map_err(invalid)?)
        }
        event_name::CALL => {
            InboundEvent::Call(serde_json::from_value::<Vec<CallEvent>>(payload).map_err(invalid)?)
        }
        event_name::GROUP_PARTICIPANTS_UPDATE => InboundEvent::GroupParticipants(
            serde_json::from_value::<GroupParticipantsUpdate>(payload).map_err(invalid)?,
        ),
        _ => return Ok(None),
    };
    Ok(Some(event))
}

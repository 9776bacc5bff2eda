//! The closed set of events a session emits.

use crate::jid::Jid;
use crate::message::MessageBatch;
use crate::types::{ConnectionState, DisconnectReason};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Details attached to a `closed` transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDisconnect {
    /// Network close code, if the collaborator exposed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Human-readable close message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A `connection.update` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    /// New connection state; absent for updates that only carry metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionState>,
    /// Close details for `closed` transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnect: Option<LastDisconnect>,
}

impl ConnectionUpdate {
    /// A bare state transition.
    #[must_use]
    pub fn state(connection: ConnectionState) -> Self {
        Self {
            connection: Some(connection),
            last_disconnect: None,
        }
    }

    /// A `closed` transition carrying the given close code.
    #[must_use]
    pub fn closed(status_code: Option<u16>) -> Self {
        Self {
            connection: Some(ConnectionState::Closed),
            last_disconnect: Some(LastDisconnect {
                status_code,
                message: None,
            }),
        }
    }

    /// Classification of the close code carried by this update.
    #[must_use]
    pub fn disconnect_reason(&self) -> DisconnectReason {
        DisconnectReason::from_status_code(
            self.last_disconnect.as_ref().and_then(|d| d.status_code),
        )
    }
}

/// One incoming call notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEvent {
    /// Call id.
    pub id: String,
    /// Caller identity.
    pub from: Jid,
    /// Call status such as `offer`, `accept` or `timeout`.
    #[serde(default)]
    pub status: String,
    /// Whether this is a video call.
    #[serde(default)]
    pub is_video: bool,
    /// Whether this is a group call.
    #[serde(default)]
    pub is_group: bool,
}

/// Group membership change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    /// Members joined or were added.
    Add,
    /// Members left or were removed.
    Remove,
    /// Members became admins.
    Promote,
    /// Members lost admin rights.
    Demote,
}

/// A `group-participants.update` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupParticipantsUpdate {
    /// Group chat identity.
    pub id: Jid,
    /// Affected members.
    #[serde(default)]
    pub participants: Vec<Jid>,
    /// What happened to them.
    pub action: ParticipantAction,
    /// Member who performed the change, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Jid>,
}

/// Every event kind the router understands.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Session lifecycle transition.
    Lifecycle(ConnectionUpdate),
    /// Updated authentication material to persist.
    CredentialsUpdate(Value),
    /// New or appended messages.
    Messages(MessageBatch),
    /// Incoming call notifications.
    Call(Vec<CallEvent>),
    /// Group membership change.
    GroupParticipants(GroupParticipantsUpdate),
}

impl InboundEvent {
    /// Stable tag name, used as a metrics label.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Lifecycle(_) => "lifecycle",
            Self::CredentialsUpdate(_) => "credentials_update",
            Self::Messages(_) => "message_batch",
            Self::Call(_) => "call",
            Self::GroupParticipants(_) => "group_participants",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn closed_update_without_code_is_unknown() {
        let update: ConnectionUpdate =
            serde_json::from_value(json!({"connection": "closed"})).unwrap();
        assert_eq!(update.connection, Some(ConnectionState::Closed));
        assert_eq!(update.disconnect_reason(), DisconnectReason::Unknown);
    }

    #[test]
    fn closed_update_reads_nested_status_code() {
        let update: ConnectionUpdate = serde_json::from_value(json!({
            "connection": "closed",
            "lastDisconnect": {"statusCode": 401, "message": "logged out"}
        }))
        .unwrap();
        assert_eq!(update.disconnect_reason(), DisconnectReason::LoggedOut);
    }

    #[test]
    fn group_update_parses_action() {
        let update: GroupParticipantsUpdate = serde_json::from_value(json!({
            "id": "1203630@g.us",
            "participants": ["1@s.whatsapp.net"],
            "action": "promote"
        }))
        .unwrap();
        assert_eq!(update.action, ParticipantAction::Promote);
        assert_eq!(update.participants.len(), 1);
    }
}

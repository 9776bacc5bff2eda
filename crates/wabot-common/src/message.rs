//! Inbound message envelopes.

use crate::jid::Jid;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Content keys that mark an envelope as control-only.
const PROTOCOL_KEY: &str = "protocolMessage";
const EPHEMERAL_KEY: &str = "ephemeralMessage";
const REACTION_KEY: &str = "reactionMessage";

/// Addressing information of a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// Chat the message belongs to.
    pub remote_jid: Jid,
    /// Whether this session sent the message.
    #[serde(default)]
    pub from_me: bool,
    /// Network message id.
    #[serde(default)]
    pub id: String,
    /// Author inside a group or status chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Jid>,
}

/// Coarse classification of an envelope's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// No content at all (e.g. a stub for an undecryptable message).
    Empty,
    /// Protocol housekeeping (revokes, history sync, key shares).
    Protocol,
    /// Disappearing-message wrapper.
    Ephemeral,
    /// Reaction marker on another message.
    Reaction,
    /// Anything a policy may act on.
    Regular,
}

impl ContentKind {
    /// Control-only kinds never reach a policy or the command handler.
    #[must_use]
    pub const fn is_control(self) -> bool {
        !matches!(self, Self::Regular)
    }
}

/// One inbound message unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Addressing of this message.
    pub key: MessageKey,
    /// Display name of the sender, when the network provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    /// Raw content object keyed by content type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Map<String, Value>>,
    /// Unix timestamp assigned by the network. Unreadable values become `None`.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_timestamp: Option<u64>,
}

/// Accepts a number, a decimal string (protobuf JSON renders 64-bit longs
/// that way) or anything else, which decodes to `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
        Other(Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        Some(Raw::Other(_)) | None => None,
    })
}

impl MessageEnvelope {
    /// Classifies the content of this envelope.
    #[must_use]
    pub fn content_kind(&self) -> ContentKind {
        let Some(content) = &self.message else {
            return ContentKind::Empty;
        };
        if content.is_empty() {
            ContentKind::Empty
        } else if content.contains_key(PROTOCOL_KEY) {
            ContentKind::Protocol
        } else if content.contains_key(EPHEMERAL_KEY) {
            ContentKind::Ephemeral
        } else if content.contains_key(REACTION_KEY) {
            ContentKind::Reaction
        } else {
            ContentKind::Regular
        }
    }

    /// Whether the envelope must be filtered before any policy runs.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.content_kind().is_control()
    }

    /// Originating identity: the participant if present, else the chat.
    #[must_use]
    pub fn origin(&self) -> &Jid {
        self.key.participant.as_ref().unwrap_or(&self.key.remote_jid)
    }

    /// Chat identity the envelope belongs to.
    #[must_use]
    pub fn chat(&self) -> &Jid {
        &self.key.remote_jid
    }

    /// Whether the envelope was posted to the status broadcast chat.
    #[must_use]
    pub fn is_status_broadcast(&self) -> bool {
        self.key.remote_jid.is_status_broadcast()
    }

    /// Plain text body, for conversation and extended-text content.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        let content = self.message.as_ref()?;
        content
            .get("conversation")
            .and_then(Value::as_str)
            .or_else(|| {
                content
                    .get("extendedTextMessage")
                    .and_then(|m| m.get("text"))
                    .and_then(Value::as_str)
            })
    }
}

/// How the network delivered a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    /// New messages arriving live.
    #[default]
    Notify,
    /// Messages appended from history or another device.
    Append,
    /// A delivery kind this version does not know.
    #[serde(other)]
    Other,
}

/// A `messages.upsert` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch {
    /// Delivery kind.
    #[serde(rename = "type", default)]
    pub kind: BatchKind,
    /// Envelopes in emission order.
    #[serde(default)]
    pub messages: Vec<MessageEnvelope>,
}

impl MessageBatch {
    /// A batch holding exactly one envelope, keeping the delivery kind.
    #[must_use]
    pub fn single(kind: BatchKind, envelope: MessageEnvelope) -> Self {
        Self {
            kind,
            messages: vec![envelope],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(content: Value) -> MessageEnvelope {
        serde_json::from_value(json!({
            "key": {"remoteJid": "123@s.whatsapp.net", "fromMe": false, "id": "ABC"},
            "message": content,
        }))
        .unwrap()
    }

    #[test]
    fn control_kinds_are_detected() {
        assert_eq!(
            envelope(json!({"protocolMessage": {"type": 0}})).content_kind(),
            ContentKind::Protocol
        );
        assert_eq!(
            envelope(json!({"ephemeralMessage": {}})).content_kind(),
            ContentKind::Ephemeral
        );
        assert_eq!(
            envelope(json!({"reactionMessage": {"text": "x"}})).content_kind(),
            ContentKind::Reaction
        );
        assert!(envelope(json!({})).is_control());
    }

    #[test]
    fn missing_content_is_empty() {
        let env: MessageEnvelope = serde_json::from_value(json!({
            "key": {"remoteJid": "123@s.whatsapp.net"}
        }))
        .unwrap();
        assert_eq!(env.content_kind(), ContentKind::Empty);
        assert!(env.is_control());
    }

    #[test]
    fn regular_text_exposes_body() {
        let env = envelope(json!({"conversation": "!menu"}));
        assert!(!env.is_control());
        assert_eq!(env.text(), Some("!menu"));

        let env = envelope(json!({"extendedTextMessage": {"text": "hi"}}));
        assert_eq!(env.text(), Some("hi"));
    }

    #[test]
    fn origin_prefers_participant() {
        let env: MessageEnvelope = serde_json::from_value(json!({
            "key": {
                "remoteJid": "status@broadcast",
                "participant": "254700000000@s.whatsapp.net"
            },
            "message": {"imageMessage": {}}
        }))
        .unwrap();
        assert!(env.is_status_broadcast());
        assert_eq!(env.origin().as_str(), "254700000000@s.whatsapp.net");
    }

    #[test]
    fn batch_kind_defaults_to_notify() {
        let batch: MessageBatch = serde_json::from_value(json!({"messages": []})).unwrap();
        assert_eq!(batch.kind, BatchKind::Notify);
    }

    #[test]
    fn unknown_batch_kind_still_decodes() {
        let batch: MessageBatch =
            serde_json::from_value(json!({"type": "history", "messages": []})).unwrap();
        assert_eq!(batch.kind, BatchKind::Other);
    }

    #[test]
    fn timestamp_accepts_numbers_and_strings() {
        let decode = |ts: Value| -> MessageEnvelope {
            serde_json::from_value(json!({
                "key": {"remoteJid": "123@s.whatsapp.net", "id": "T"},
                "message": {"conversation": "hi"},
                "messageTimestamp": ts,
            }))
            .unwrap()
        };
        assert_eq!(decode(json!(1_700_000_000)).message_timestamp, Some(1_700_000_000));
        assert_eq!(decode(json!("1700000000")).message_timestamp, Some(1_700_000_000));
        assert_eq!(
            decode(json!({"low": 1, "high": 0, "unsigned": true})).message_timestamp,
            None
        );
        assert_eq!(decode(json!("soon")).message_timestamp, None);
        assert_eq!(decode(Value::Null).message_timestamp, None);
    }
}

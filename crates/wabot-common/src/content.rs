//! Outbound message content and send options.

use crate::jid::Jid;
use crate::message::{MessageEnvelope, MessageKey};
use serde::{Deserialize, Serialize};

/// Link preview attached to a text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAdReply {
    /// Preview title.
    pub title: String,
    /// Preview body line.
    pub body: String,
    /// Link opened when the preview is tapped.
    pub source_url: String,
    /// Preview media type (1 = image).
    pub media_type: u8,
    /// Whether to show a large thumbnail.
    pub render_larger_thumbnail: bool,
    /// Whether to mark the preview as an ad.
    pub show_ad_attribution: bool,
}

/// Context wrapper around [`ExternalAdReply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    /// Attached link preview.
    pub external_ad_reply: ExternalAdReply,
}

/// Label of a quick-action button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonText {
    /// Text shown on the button.
    pub display_text: String,
}

/// A quick-action button; tapping it sends `button_id` back as a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Button {
    /// Payload sent when tapped.
    pub button_id: String,
    /// Label.
    pub button_text: ButtonText,
    /// Button type (1 = reply).
    #[serde(rename = "type")]
    pub kind: u8,
}

impl Button {
    /// A reply button.
    pub fn reply(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            button_id: id.into(),
            button_text: ButtonText {
                display_text: label.into(),
            },
            kind: 1,
        }
    }
}

/// Text message with optional decoration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessage {
    /// Body.
    pub text: String,
    /// Footer line under the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    /// View-once flag.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub view_once: bool,
    /// Quick-action buttons.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    /// Header type, required by the network when buttons are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_type: Option<u8>,
    /// Link preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

impl TextMessage {
    /// Plain text with no decoration.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A reaction on an existing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Emoji to react with.
    pub text: String,
    /// Message being reacted to.
    pub key: MessageKey,
}

/// Anything the session can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundContent {
    /// A reaction.
    React {
        /// Reaction details.
        react: Reaction,
    },
    /// A text message.
    Text(TextMessage),
}

impl OutboundContent {
    /// Plain text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextMessage::plain(text))
    }

    /// Reaction on the message identified by `key`.
    pub fn react(emoji: impl Into<String>, key: MessageKey) -> Self {
        Self::React {
            react: Reaction {
                text: emoji.into(),
                key,
            },
        }
    }
}

/// Per-send options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    /// Envelope to quote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted: Option<MessageEnvelope>,
    /// Visibility scope for sends into the status broadcast chat.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_jid_list: Vec<Jid>,
}

impl SendOptions {
    /// Quote `envelope` in the reply.
    #[must_use]
    pub fn quoting(envelope: &MessageEnvelope) -> Self {
        Self {
            quoted: Some(envelope.clone()),
            ..Self::default()
        }
    }

    /// Restrict visibility to the given identities.
    #[must_use]
    pub fn status_scope(jids: Vec<Jid>) -> Self {
        Self {
            status_jid_list: jids,
            ..Self::default()
        }
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-platform message shapes: what arrives over the real-time connection
//! or the events endpoint, and what is posted back through the REST surface.

use serde::{Deserialize, Serialize};

/// An inbound real-time event. Only the fields routing needs are decoded;
/// everything else in the frame is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtmMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// Present on join events sent on behalf of another user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inviter: Option<String>,
}

impl RtmMessage {
    /// A plain `message` event, mostly useful for tests and synthetic input.
    pub fn message(channel: &str, user: &str, text: &str) -> Self {
        Self {
            kind: "message".into(),
            channel: channel.into(),
            user: user.into(),
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A message posted to, or returned by, the platform REST surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<serde_json::Value>,
}

impl ChatMessage {
    /// A text message addressed to `channel`.
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

impl From<&RtmMessage> for ChatMessage {
    fn from(m: &RtmMessage) -> Self {
        Self {
            channel: m.channel.clone(),
            text: m.text.clone(),
            ts: m.ts.clone(),
            thread_ts: m.thread_ts.clone(),
            attachments: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtm_message_ignores_unknown_fields() {
        let raw = r#"{"type":"message","channel":"D024BE91L","user":"U2147483697",
            "text":"Hello world","ts":"1355517523.000005","edited":{"user":"U1"}}"#;
        let m: RtmMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(m.kind, "message");
        assert_eq!(m.channel, "D024BE91L");
        assert!(m.subtype.is_none());
    }

    #[test]
    fn chat_message_omits_empty_fields() {
        let json = serde_json::to_value(ChatMessage::text("hi")).unwrap();
        assert_eq!(json["text"], "hi");
        assert!(json.get("ts").is_none());
        assert!(json.get("thread_ts").is_none());
        assert!(json.get("attachments").is_none());
    }
}

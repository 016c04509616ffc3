// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control frames recognised on a tenant connection.

use serde::Serialize;
use serde_json::Value;

/// Frame type asking the client to use a new endpoint for future connects.
pub const RECONNECT_URL: &str = "reconnect_url";

/// What the read loop does with one text frame.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameAction {
    /// Re-point the connection's tracked endpoint; do not forward.
    Reconnect(String),
    /// Forward the payload unchanged.
    Forward,
}

/// Inspect a frame for the reconnect-control shape.
///
/// Fails only when the payload is not JSON at all.
pub fn classify_frame(payload: &str) -> Result<FrameAction, serde_json::Error> {
    let value: Value = serde_json::from_str(payload)?;
    let kind = value.get("type").and_then(Value::as_str);
    let url = value.get("url").and_then(Value::as_str);
    match (kind, url) {
        (Some(RECONNECT_URL), Some(url)) => Ok(FrameAction::Reconnect(url.to_string())),
        _ => Ok(FrameAction::Forward),
    }
}

/// Outbound typing indicator.
#[derive(Debug, Serialize)]
pub struct TypingFrame<'a> {
    pub id: u64,
    pub channel: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl<'a> TypingFrame<'a> {
    pub fn new(channel: &'a str) -> Self {
        Self {
            id: 1,
            channel,
            kind: "typing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_frame_is_recognised() {
        let action =
            classify_frame(r#"{"type":"reconnect_url","url":"wss://example.test/next"}"#).unwrap();
        assert_eq!(
            action,
            FrameAction::Reconnect("wss://example.test/next".into())
        );
    }

    #[test]
    fn other_frames_are_forwarded() {
        assert_eq!(
            classify_frame(r#"{"type":"message","text":"hi"}"#).unwrap(),
            FrameAction::Forward
        );
        assert_eq!(classify_frame(r#"{"ok":true}"#).unwrap(), FrameAction::Forward);
        assert_eq!(classify_frame(r#"{"type":7}"#).unwrap(), FrameAction::Forward);
        assert_eq!(classify_frame("[1,2]").unwrap(), FrameAction::Forward);
        // A reconnect frame without a url is opaque.
        assert_eq!(
            classify_frame(r#"{"type":"reconnect_url"}"#).unwrap(),
            FrameAction::Forward
        );
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(classify_frame("not json").is_err());
    }

    #[test]
    fn typing_frame_shape() {
        let json = serde_json::to_string(&TypingFrame::new("C1")).unwrap();
        assert_eq!(json, r#"{"id":1,"channel":"C1","type":"typing"}"#);
    }
}

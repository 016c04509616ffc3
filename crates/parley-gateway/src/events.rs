// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-callback envelopes and the sink they are handed to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use parley_core::{ParleyError, RtmMessage, TenantId};

/// Receives events delivered over HTTP instead of a real-time connection.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Route one event for `tenant`. `NotFound` when the tenant has no bot.
    async fn handle_event(&self, tenant: &TenantId, event: RtmMessage) -> Result<(), ParleyError>;

    /// Whether `tenant` has an installed bot.
    async fn has_bot(&self, tenant: &TenantId) -> Result<bool, ParleyError>;
}

/// The JSON body posted to the events endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventEnvelope {
    pub token: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Echoed back for `url_verification`.
    pub challenge: String,
    pub team_id: String,
    pub api_app_id: String,
    pub event_id: String,
    pub event_time: i64,
    pub event: Option<RtmMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_event_callback() {
        let raw = r#"{
            "token": "verify",
            "team_id": "T1",
            "api_app_id": "A1",
            "type": "event_callback",
            "event": {"type": "message", "channel": "D1", "user": "U1", "text": "hi", "ts": "1.2", "event_ts": "1.2"},
            "event_id": "Ev1",
            "event_time": 1234567890,
            "authed_users": ["U1"]
        }"#;
        let env: EventEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.kind, "event_callback");
        let event = env.event.unwrap();
        assert_eq!(event.kind, "message");
        assert_eq!(event.text, "hi");
    }

    #[test]
    fn decodes_url_verification() {
        let env: EventEnvelope = serde_json::from_str(
            r#"{"token":"verify","challenge":"3eZbrw1aB","type":"url_verification"}"#,
        )
        .unwrap();
        assert_eq!(env.challenge, "3eZbrw1aB");
        assert!(env.event.is_none());
    }
}

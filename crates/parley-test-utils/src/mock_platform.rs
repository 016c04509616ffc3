// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat platform REST API for deterministic testing.
//!
//! `MockPlatformApi` implements `PlatformApi`, stamps posted messages with
//! increasing timestamps and captures every call for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::{BotRecord, ChatMessage, ParleyError, PlatformApi, TenantId, UserId};

/// A recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub token: String,
    pub message: ChatMessage,
}

/// A mock platform that accepts every message.
///
/// - Posted messages get a `ts` of the form `"1000.000001"`, incrementing per call.
/// - `connect_url()` pops queued endpoints, falling back to the default one.
pub struct MockPlatformApi {
    posted: Arc<Mutex<Vec<RecordedCall>>>,
    updated: Arc<Mutex<Vec<RecordedCall>>>,
    endpoints: Arc<Mutex<VecDeque<String>>>,
    default_endpoint: String,
    counter: AtomicU64,
    fail_posts: Arc<Mutex<bool>>,
}

impl MockPlatformApi {
    /// Create a mock whose `connect_url()` always answers `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            posted: Arc::new(Mutex::new(Vec::new())),
            updated: Arc::new(Mutex::new(Vec::new())),
            endpoints: Arc::new(Mutex::new(VecDeque::new())),
            default_endpoint: endpoint.into(),
            counter: AtomicU64::new(0),
            fail_posts: Arc::new(Mutex::new(false)),
        }
    }

    /// Queue an endpoint for the next `connect_url()` call.
    pub async fn push_endpoint(&self, endpoint: impl Into<String>) {
        self.endpoints.lock().await.push_back(endpoint.into());
    }

    /// Make subsequent `post_message()` calls fail with an HTTP error.
    pub async fn fail_posts(&self, fail: bool) {
        *self.fail_posts.lock().await = fail;
    }

    pub async fn posted(&self) -> Vec<RecordedCall> {
        self.posted.lock().await.clone()
    }

    pub async fn updated(&self) -> Vec<RecordedCall> {
        self.updated.lock().await.clone()
    }

    fn next_ts(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("1000.{n:06}")
    }
}

impl Default for MockPlatformApi {
    fn default() -> Self {
        Self::new("ws://127.0.0.1:1/")
    }
}

#[async_trait]
impl PlatformApi for MockPlatformApi {
    async fn post_message(
        &self,
        token: &str,
        msg: &ChatMessage,
    ) -> Result<ChatMessage, ParleyError> {
        if *self.fail_posts.lock().await {
            return Err(ParleyError::Http {
                message: "mock post failure".into(),
                source: None,
            });
        }
        let mut stored = msg.clone();
        stored.ts = self.next_ts();
        self.posted.lock().await.push(RecordedCall {
            token: token.to_string(),
            message: stored.clone(),
        });
        Ok(stored)
    }

    async fn update_message(
        &self,
        token: &str,
        msg: &ChatMessage,
    ) -> Result<ChatMessage, ParleyError> {
        self.updated.lock().await.push(RecordedCall {
            token: token.to_string(),
            message: msg.clone(),
        });
        Ok(msg.clone())
    }

    async fn connect_url(&self, _token: &str) -> Result<String, ParleyError> {
        Ok(self
            .endpoints
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.default_endpoint.clone()))
    }

    /// Tokens of the form `xoxb-{team}-{user}` identify as that team and user.
    async fn identify(&self, token: &str) -> Result<BotRecord, ParleyError> {
        let mut parts = token.splitn(3, '-').skip(1);
        match (parts.next(), parts.next()) {
            (Some(team), Some(user)) => Ok(BotRecord {
                tenant: TenantId::new(team),
                bot_user_id: UserId::new(user),
                token: token.to_string(),
            }),
            _ => Err(ParleyError::InvalidInput(
                "mock tokens look like xoxb-TEAM-USER".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn post_stamps_increasing_ts() {
        let api = MockPlatformApi::default();
        let msg = ChatMessage::new("C1", "hello");
        let first = api.post_message("xoxb", &msg).await.unwrap();
        let second = api.post_message("xoxb", &msg).await.unwrap();
        assert_eq!(first.ts, "1000.000001");
        assert_eq!(second.ts, "1000.000002");
        assert_eq!(api.posted().await.len(), 2);
    }

    #[tokio::test]
    async fn queued_endpoints_come_first() {
        let api = MockPlatformApi::new("ws://default");
        api.push_endpoint("ws://first").await;
        assert_eq!(api.connect_url("t").await.unwrap(), "ws://first");
        assert_eq!(api.connect_url("t").await.unwrap(), "ws://default");
    }

    #[tokio::test]
    async fn identify_parses_mock_tokens() {
        let api = MockPlatformApi::default();
        let record = api.identify("xoxb-T1-UBOT").await.unwrap();
        assert_eq!(record.tenant.as_str(), "T1");
        assert_eq!(record.bot_user_id.as_str(), "UBOT");
        assert!(api.identify("garbage").await.is_err());
    }

    #[tokio::test]
    async fn failing_posts() {
        let api = MockPlatformApi::default();
        api.fail_posts(true).await;
        let err = api
            .post_message("t", &ChatMessage::new("C1", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Http { .. }));
    }
}

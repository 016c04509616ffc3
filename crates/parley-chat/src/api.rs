// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the platform Web API.
//!
//! Every method is a JSON POST to `{base_url}/{method}` authenticated with
//! the bot token. The API answers 200 with `{"ok": false, "error": ...}` for
//! most failures, so the `ok` flag is checked on every response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use parley_core::{BotRecord, ChatMessage, ParleyError, PlatformApi, TenantId, UserId};

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Clone)]
pub struct HttpPlatformApi {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpPlatformApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ParleyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ParleyError::Http {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Override the transient-error retry policy.
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        token: &str,
        body: &Value,
    ) -> Result<T, ParleyError> {
        let url = format!("{}/{method}", self.base_url);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(method, attempt, "retrying API call after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(token)
                .json(body)
                .send()
                .await
                .map_err(|e| ParleyError::Http {
                    message: format!("{method} request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(method, status = %status, attempt, "API response received");
            if is_transient_error(status) && attempt < self.max_retries {
                continue;
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ParleyError::Http {
                    message: format!("{method} returned {status}: {text}"),
                    source: None,
                });
            }

            let value: Value = response.json().await.map_err(|e| ParleyError::Http {
                message: format!("{method} returned an unreadable body: {e}"),
                source: Some(Box::new(e)),
            })?;
            if value.get("ok").and_then(Value::as_bool) != Some(true) {
                let error = value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown_error");
                return Err(ParleyError::Http {
                    message: format!("{method} failed: {error}"),
                    source: None,
                });
            }
            return serde_json::from_value(value).map_err(ParleyError::decode);
        }

        Err(ParleyError::Http {
            message: format!("{method} failed after retries"),
            source: None,
        })
    }
}

fn is_transient_error(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
    )
}

#[derive(Deserialize)]
struct PostMessageResponse {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    ts: String,
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct UpdateResponse {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    ts: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ConnectResponse {
    url: String,
}

#[derive(Deserialize)]
struct AuthTestResponse {
    team_id: String,
    user_id: String,
}

#[async_trait]
impl PlatformApi for HttpPlatformApi {
    async fn post_message(
        &self,
        token: &str,
        msg: &ChatMessage,
    ) -> Result<ChatMessage, ParleyError> {
        let body = serde_json::to_value(msg).map_err(ParleyError::decode)?;
        let res: PostMessageResponse = self.call("chat.postMessage", token, &body).await?;
        let mut posted = res.message.unwrap_or_else(|| msg.clone());
        posted.channel = res.channel;
        posted.ts = res.ts;
        if posted.thread_ts.is_none() {
            posted.thread_ts = msg.thread_ts.clone();
        }
        Ok(posted)
    }

    async fn update_message(
        &self,
        token: &str,
        msg: &ChatMessage,
    ) -> Result<ChatMessage, ParleyError> {
        if msg.ts.is_empty() {
            return Err(ParleyError::InvalidInput("update needs the message ts".into()));
        }
        let body = serde_json::to_value(msg).map_err(ParleyError::decode)?;
        let res: UpdateResponse = self.call("chat.update", token, &body).await?;
        let mut updated = msg.clone();
        updated.channel = res.channel;
        updated.ts = res.ts;
        if let Some(text) = res.text {
            updated.text = text;
        }
        Ok(updated)
    }

    async fn connect_url(&self, token: &str) -> Result<String, ParleyError> {
        let res: ConnectResponse = self.call("rtm.connect", token, &json!({})).await?;
        Ok(res.url)
    }

    async fn identify(&self, token: &str) -> Result<BotRecord, ParleyError> {
        let res: AuthTestResponse = self.call("auth.test", token, &json!({})).await?;
        Ok(BotRecord {
            tenant: TenantId::new(res.team_id),
            bot_user_id: UserId::new(res.user_id),
            token: token.to_string(),
        })
    }
}

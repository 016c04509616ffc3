// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley bot toolkit.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// HTTP listener and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat-platform variant settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Widget (websocket) variant settings.
    #[serde(default)]
    pub web: WebConfig,

    /// Category stream and worker pool sizing.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Chat-platform variant configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Shared verification token checked on every inbound HTTP payload.
    /// `None` disables the check.
    #[serde(default)]
    pub verification_token: Option<String>,

    /// Base URL of the platform REST API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// How long a command or interaction request waits for an immediate response.
    #[serde(default = "default_immediate_response_timeout_ms")]
    pub immediate_response_timeout_ms: u64,

    /// How many times a response URL may be used for one request.
    #[serde(default = "default_response_quota")]
    pub response_quota: u8,

    /// Bot tokens to install at startup, in addition to those already stored.
    #[serde(default)]
    pub bot_tokens: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            verification_token: None,
            api_base_url: default_api_base_url(),
            immediate_response_timeout_ms: default_immediate_response_timeout_ms(),
            response_quota: default_response_quota(),
            bot_tokens: Vec::new(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_immediate_response_timeout_ms() -> u64 {
    2000
}

fn default_response_quota() -> u8 {
    5
}

/// Widget variant configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebConfig {
    /// Route the websocket endpoint is mounted on.
    #[serde(default = "default_web_path")]
    pub path: String,

    /// Per-connection outgoing item buffer.
    #[serde(default = "default_outgoing_buffer")]
    pub outgoing_buffer: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            path: default_web_path(),
            outgoing_buffer: default_outgoing_buffer(),
        }
    }
}

fn default_web_path() -> String {
    "/ws".to_string()
}

fn default_outgoing_buffer() -> usize {
    64
}

/// Dispatcher sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Buffered events per category stream before new events are dropped.
    #[serde(default = "default_stream_capacity")]
    pub stream_capacity: usize,

    /// Workers running conversation handlers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pending conversation deliveries before new ones are dropped.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            stream_capacity: default_stream_capacity(),
            workers: default_workers(),
            queue_depth: default_queue_depth(),
        }
    }
}

fn default_stream_capacity() -> usize {
    256
}

fn default_workers() -> usize {
    8
}

fn default_queue_depth() -> usize {
    1024
}

/// Which persistence backend the stores use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Connection URL, required when `backend = "redis"`.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Prefix of every Redis key, so several deployments can share a server.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            redis_url: None,
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    "parley".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ParleyConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.chat.immediate_response_timeout_ms, 2000);
        assert_eq!(config.chat.response_quota, 5);
        assert_eq!(config.web.path, "/ws");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.storage.redis_url.is_none());
        assert_eq!(config.storage.namespace, "parley");
    }
}

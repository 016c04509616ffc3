// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates constraints that serde attributes cannot express: non-empty
//! addresses, positive capacities, and a Redis URL when Redis is selected.

use crate::diagnostic::ConfigError;
use crate::model::{ParleyConfig, StorageBackend};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Routes the chat gateway mounts next to the widget endpoint.
const RESERVED_PATHS: &[&str] = &["/health", "/slack/events", "/slack/commands", "/slack/interactions"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        ));
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        fail(format!(
            "server.log_level `{}` must be one of {}",
            config.server.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.chat.immediate_response_timeout_ms == 0 {
        fail("chat.immediate_response_timeout_ms must be greater than 0".to_string());
    }

    if !config.chat.api_base_url.starts_with("http://")
        && !config.chat.api_base_url.starts_with("https://")
    {
        fail(format!(
            "chat.api_base_url `{}` must be an http(s) URL",
            config.chat.api_base_url
        ));
    }

    if !config.web.path.starts_with('/') {
        fail(format!("web.path `{}` must start with `/`", config.web.path));
    } else if RESERVED_PATHS.contains(&config.web.path.as_str()) {
        fail(format!(
            "web.path `{}` is already served by the chat gateway",
            config.web.path
        ));
    }

    for (name, value) in [
        ("web.outgoing_buffer", config.web.outgoing_buffer),
        ("dispatch.stream_capacity", config.dispatch.stream_capacity),
        ("dispatch.workers", config.dispatch.workers),
        ("dispatch.queue_depth", config.dispatch.queue_depth),
    ] {
        if value == 0 {
            fail(format!("{name} must be greater than 0"));
        }
    }

    if config.storage.backend == StorageBackend::Redis
        && config
            .storage
            .redis_url
            .as_deref()
            .is_none_or(|url| url.trim().is_empty())
    {
        fail("storage.redis_url is required when storage.backend = \"redis\"".to_string());
    }

    if config.storage.namespace.trim().is_empty() || config.storage.namespace.contains(' ') {
        fail(format!(
            "storage.namespace `{}` must be non-empty and contain no spaces",
            config.storage.namespace
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &ParleyConfig) -> Vec<String> {
        validate_config(config)
            .err()
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ParleyConfig::default()).is_ok());
    }

    #[test]
    fn widget_path_cannot_shadow_gateway_routes() {
        let mut config = ParleyConfig::default();
        config.web.path = "/slack/events".into();
        let errs = messages(&config);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("chat gateway"));
    }

    #[test]
    fn empty_namespace_is_rejected() {
        let mut config = ParleyConfig::default();
        config.storage.namespace = " ".into();
        assert!(messages(&config)[0].contains("storage.namespace"));
    }

    #[test]
    fn redis_backend_requires_url() {
        let mut config = ParleyConfig::default();
        config.storage.backend = StorageBackend::Redis;
        let errs = messages(&config);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("storage.redis_url"));

        config.storage.redis_url = Some("redis://127.0.0.1:6379".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ParleyConfig::default();
        config.dispatch.workers = 0;
        config.dispatch.queue_depth = 0;
        config.web.path = "ws".into();
        config.server.log_level = "loud".into();
        let errs = messages(&config);
        assert_eq!(errs.len(), 4, "{errs:?}");
    }

    #[test]
    fn rejects_bad_host() {
        let mut config = ParleyConfig::default();
        config.server.host = "not a host!".into();
        assert_eq!(messages(&config).len(), 1);
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley config` subcommands.

use parley_config::ParleyConfig;
use parley_config::model::StorageBackend;

/// One line describing a configuration that passed validation.
pub fn check_summary(config: &ParleyConfig) -> String {
    let storage = match config.storage.backend {
        StorageBackend::Memory => "memory".to_string(),
        StorageBackend::Redis => format!("redis, namespace {}", config.storage.namespace),
    };
    format!(
        "parley: config OK (listen {}:{}, widget path {}, storage {storage}, {} bot token(s))",
        config.server.host,
        config.server.port,
        config.web.path,
        config.chat.bot_tokens.len()
    )
}

/// The effective configuration as TOML, with secrets masked.
pub fn render(config: &ParleyConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.chat.verification_token.is_some() {
        shown.chat.verification_token = Some(MASK.to_string());
    }
    shown.chat.bot_tokens = shown
        .chat
        .bot_tokens
        .iter()
        .map(|_| MASK.to_string())
        .collect();
    toml::to_string_pretty(&shown)
}

const MASK: &str = "********";

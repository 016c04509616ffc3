// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound REST surface of the chat platform.

use async_trait::async_trait;

use crate::chat::ChatMessage;
use crate::error::ParleyError;
use crate::types::BotRecord;

/// The "reply/say" capability used by chat bots.
///
/// Calls complete before returning: the result is either the message as
/// normalized by the platform (with its `ts` set) or an error.
#[async_trait]
pub trait PlatformApi: Send + Sync + 'static {
    async fn post_message(&self, token: &str, msg: &ChatMessage)
    -> Result<ChatMessage, ParleyError>;

    /// Replace the text of the message identified by `msg.channel` / `msg.ts`.
    async fn update_message(
        &self,
        token: &str,
        msg: &ChatMessage,
    ) -> Result<ChatMessage, ParleyError>;

    /// Ask the platform for a fresh real-time endpoint for the bot.
    async fn connect_url(&self, token: &str) -> Result<String, ParleyError>;

    /// Resolve a bot token to the workspace and bot user it belongs to.
    async fn identify(&self, token: &str) -> Result<BotRecord, ParleyError>;
}

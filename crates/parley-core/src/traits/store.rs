// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot and conversation persistence traits.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::types::{BotRecord, ConversationKey, TenantId};

/// Stores installed chat-platform bots, one per tenant.
#[async_trait]
pub trait BotStore: Send + Sync + 'static {
    /// Fails with `AlreadyExists` when the tenant already has a bot.
    async fn add_bot(&self, record: BotRecord) -> Result<(), ParleyError>;

    /// Fails with `NotFound` when the tenant has no bot.
    async fn get_bot(&self, tenant: &TenantId) -> Result<BotRecord, ParleyError>;

    /// Fails with `NotFound` when the tenant has no bot.
    async fn remove_bot(&self, tenant: &TenantId) -> Result<(), ParleyError>;

    async fn all_bots(&self) -> Result<Vec<BotRecord>, ParleyError>;
}

/// Persists the active conversation per (tenant, user, room) together with
/// its current state and scratch key/value data.
#[async_trait]
pub trait ConversationStore: Send + Sync + 'static {
    /// Records `id` as active in state `"start"` with an empty scratch map.
    ///
    /// Fails with `AlreadyActive` when a conversation is already running for `key`.
    async fn start(&self, key: &ConversationKey, id: &str) -> Result<(), ParleyError>;

    async fn is_active(&self, key: &ConversationKey) -> Result<bool, ParleyError>;

    /// Returns `(definition id, state)` or `ConversationNotFound`.
    async fn active(&self, key: &ConversationKey) -> Result<(String, String), ParleyError>;

    async fn set_state(&self, key: &ConversationKey, state: &str) -> Result<(), ParleyError>;

    async fn set_data(
        &self,
        key: &ConversationKey,
        field: &str,
        value: &str,
    ) -> Result<(), ParleyError>;

    /// `ItemNotFound` for a field never set, `ConversationNotFound` when
    /// there is no scratch map for `key` at all.
    async fn get_data(&self, key: &ConversationKey, field: &str) -> Result<String, ParleyError>;

    /// Removes the active record and its scratch map.
    ///
    /// Fails with `ConversationNotFound` when nothing is active.
    async fn end(&self, key: &ConversationKey) -> Result<(), ParleyError>;
}

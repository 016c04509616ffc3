// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The capability handed to conversation handlers.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use parley_core::{ConversationKey, ConversationStore, ParleyError};

/// Bound to one active conversation: its bot, user and room.
pub struct Controls<B> {
    bot: B,
    key: ConversationKey,
    conversation: String,
    states: Arc<BTreeSet<String>>,
    store: Arc<dyn ConversationStore>,
}

impl<B> Controls<B> {
    pub fn new(
        bot: B,
        key: ConversationKey,
        conversation: impl Into<String>,
        states: Arc<BTreeSet<String>>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            bot,
            key,
            conversation: conversation.into(),
            states,
            store,
        }
    }

    /// The bot the conversation runs on, for replying.
    pub fn bot(&self) -> &B {
        &self.bot
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Name of the running conversation definition.
    pub fn conversation(&self) -> &str {
        &self.conversation
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), ParleyError> {
        self.store.set_data(&self.key, key, value).await
    }

    /// `ItemNotFound` when `key` was never set in this conversation.
    pub async fn get(&self, key: &str) -> Result<String, ParleyError> {
        self.store.get_data(&self.key, key).await
    }

    /// Move to `state` without ending the conversation.
    ///
    /// Fails with `InvalidInput` when the definition has no such state.
    pub async fn to(&self, state: &str) -> Result<(), ParleyError> {
        if !self.states.contains(state) {
            return Err(ParleyError::InvalidInput(format!(
                "conversation \"{}\" has no state \"{state}\"",
                self.conversation
            )));
        }
        debug!(key = %self.key, state, "conversation transition");
        self.store.set_state(&self.key, state).await
    }

    /// End the conversation, dropping its scratch data.
    pub async fn end(&self) -> Result<(), ParleyError> {
        debug!(key = %self.key, "conversation ended");
        self.store.end(&self.key).await
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs registered conversations against a conversation store.

use std::sync::Arc;

use tracing::{debug, info};

use parley_core::{ConversationKey, ConversationStore, ParleyError};

use crate::controls::Controls;
use crate::definition::START;
use crate::registry::ConversationRegistry;

/// Registry plus persistence: starts conversations and delivers messages to
/// the current state's handler.
pub struct ConversationEngine<M, B> {
    registry: Arc<ConversationRegistry<M, B>>,
    store: Arc<dyn ConversationStore>,
}

impl<M, B> Clone for ConversationEngine<M, B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
        }
    }
}

impl<M, B> ConversationEngine<M, B>
where
    M: Default + Send + 'static,
    B: Send + 'static,
{
    pub fn new(registry: Arc<ConversationRegistry<M, B>>, store: Arc<dyn ConversationStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &ConversationRegistry<M, B> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub async fn is_active(&self, key: &ConversationKey) -> Result<bool, ParleyError> {
        self.store.is_active(key).await
    }

    /// Start conversation `name` for `key` and run its start handler with an
    /// empty message.
    ///
    /// Fails with `NotFound` for an unregistered name and `AlreadyActive`
    /// when `key` already has a conversation.
    pub async fn start(&self, key: ConversationKey, name: &str, bot: B) -> Result<(), ParleyError> {
        let definition = self.registry.get(name)?;
        self.store.start(&key, name).await?;
        info!(key = %key, conversation = name, "conversation started");

        let handler = definition.handler(START).ok_or_else(|| {
            ParleyError::Internal(format!("conversation \"{name}\" lost its start state"))
        })?;
        let controls = Controls::new(
            bot,
            key,
            name,
            definition.state_names(),
            Arc::clone(&self.store),
        );
        handler(M::default(), controls).await
    }

    /// Deliver `msg` to the handler of `key`'s current state.
    ///
    /// Fails with `ConversationNotFound` when nothing is active for `key`.
    pub async fn deliver(&self, key: ConversationKey, bot: B, msg: M) -> Result<(), ParleyError> {
        let (name, state) = self.store.active(&key).await?;
        let definition = self.registry.get(&name)?;
        let handler = definition.handler(&state).ok_or_else(|| {
            ParleyError::InvalidInput(format!(
                "conversation \"{name}\" has no state \"{state}\""
            ))
        })?;
        debug!(key = %key, conversation = %name, state = %state, "delivering to conversation");

        let controls = Controls::new(
            bot,
            key,
            name,
            definition.state_names(),
            Arc::clone(&self.store),
        );
        handler(msg, controls).await
    }
}

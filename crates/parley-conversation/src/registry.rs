// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name → definition registry, filled at startup and read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use parley_core::ParleyError;

use crate::definition::Conversation;

pub struct ConversationRegistry<M, B> {
    definitions: HashMap<String, Arc<Conversation<M, B>>>,
}

impl<M, B> Default for ConversationRegistry<M, B> {
    fn default() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }
}

impl<M, B> ConversationRegistry<M, B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `definition` under `name` after validating it.
    ///
    /// Fails with `AlreadyExists` for a taken name and `InvalidInput` when
    /// the definition has no `start` state or declares an unknown target.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        definition: Conversation<M, B>,
    ) -> Result<(), ParleyError> {
        let name = name.into();
        if self.definitions.contains_key(&name) {
            return Err(ParleyError::already_exists("conversation", name));
        }
        definition.validate()?;
        info!(conversation = %name, "conversation registered");
        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Conversation<M, B>>, ParleyError> {
        self.definitions
            .get(name)
            .cloned()
            .ok_or_else(|| ParleyError::not_found("conversation", name))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

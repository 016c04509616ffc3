// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation store.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use parley_core::{ConversationKey, ConversationStore, ParleyError};

use crate::definition::START;

struct Active {
    id: String,
    state: String,
    data: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryConversationStore {
    active: DashMap<ConversationKey, Active>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn start(&self, key: &ConversationKey, id: &str) -> Result<(), ParleyError> {
        match self.active.entry(key.clone()) {
            Entry::Occupied(_) => Err(ParleyError::AlreadyActive(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Active {
                    id: id.to_string(),
                    state: START.to_string(),
                    data: HashMap::new(),
                });
                Ok(())
            }
        }
    }

    async fn is_active(&self, key: &ConversationKey) -> Result<bool, ParleyError> {
        Ok(self.active.contains_key(key))
    }

    async fn active(&self, key: &ConversationKey) -> Result<(String, String), ParleyError> {
        self.active
            .get(key)
            .map(|a| (a.id.clone(), a.state.clone()))
            .ok_or(ParleyError::ConversationNotFound)
    }

    async fn set_state(&self, key: &ConversationKey, state: &str) -> Result<(), ParleyError> {
        let mut active = self
            .active
            .get_mut(key)
            .ok_or(ParleyError::ConversationNotFound)?;
        active.state = state.to_string();
        Ok(())
    }

    async fn set_data(
        &self,
        key: &ConversationKey,
        field: &str,
        value: &str,
    ) -> Result<(), ParleyError> {
        let mut active = self
            .active
            .get_mut(key)
            .ok_or(ParleyError::ConversationNotFound)?;
        active.data.insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn get_data(&self, key: &ConversationKey, field: &str) -> Result<String, ParleyError> {
        let active = self
            .active
            .get(key)
            .ok_or(ParleyError::ConversationNotFound)?;
        active
            .data
            .get(field)
            .cloned()
            .ok_or(ParleyError::ItemNotFound)
    }

    async fn end(&self, key: &ConversationKey) -> Result<(), ParleyError> {
        self.active
            .remove(key)
            .map(|_| ())
            .ok_or(ParleyError::ConversationNotFound)
    }
}

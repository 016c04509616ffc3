// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Controller stores: which widget bots are connected, and their item stores.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use parley_core::{ControllerStore, ItemStore, ParleyError, TenantId};

use crate::memory::MemoryItemStore;
use crate::redis_store::RedisItemStore;

/// Keeps every bot's items in process memory; removing a bot drops its items.
#[derive(Default)]
pub struct MemoryControllerStore {
    stores: DashMap<TenantId, Arc<MemoryItemStore>>,
}

impl MemoryControllerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ControllerStore for MemoryControllerStore {
    async fn add(&self, bot: &TenantId) -> Result<(), ParleyError> {
        match self.stores.entry(bot.clone()) {
            Entry::Occupied(_) => Err(ParleyError::already_exists("bot", bot.as_str())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(MemoryItemStore::new()));
                Ok(())
            }
        }
    }

    async fn get(&self, bot: &TenantId) -> Result<Arc<dyn ItemStore>, ParleyError> {
        self.stores
            .get(bot)
            .map(|s| Arc::clone(s.value()) as Arc<dyn ItemStore>)
            .ok_or_else(|| ParleyError::not_found("bot", bot.as_str()))
    }

    async fn remove(&self, bot: &TenantId) -> Result<(), ParleyError> {
        self.stores
            .remove(bot)
            .map(|_| ())
            .ok_or_else(|| ParleyError::not_found("bot", bot.as_str()))
    }
}

/// Tracks connected bots in the Redis set `{ns}:bots`.
///
/// Item history stays in Redis after a bot is removed.
pub struct RedisControllerStore {
    namespace: String,
    connection: ConnectionManager,
    stores: DashMap<TenantId, Arc<RedisItemStore>>,
}

impl RedisControllerStore {
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, ParleyError> {
        let client = redis::Client::open(url).map_err(ParleyError::storage)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(ParleyError::storage)?;
        let namespace = namespace.into();
        info!(namespace = %namespace, "redis controller store connected");
        Ok(Self {
            namespace,
            connection,
            stores: DashMap::new(),
        })
    }

    fn bots_key(&self) -> String {
        format!("{}:bots", self.namespace)
    }
}

#[async_trait]
impl ControllerStore for RedisControllerStore {
    async fn add(&self, bot: &TenantId) -> Result<(), ParleyError> {
        let mut conn = self.connection.clone();
        let added: usize = conn
            .sadd(self.bots_key(), bot.as_str())
            .await
            .map_err(ParleyError::storage)?;
        if added == 0 {
            return Err(ParleyError::already_exists("bot", bot.as_str()));
        }
        self.stores.insert(
            bot.clone(),
            Arc::new(RedisItemStore::with_connection(
                self.connection.clone(),
                &self.namespace,
                bot,
            )),
        );
        Ok(())
    }

    async fn get(&self, bot: &TenantId) -> Result<Arc<dyn ItemStore>, ParleyError> {
        if let Some(store) = self.stores.get(bot) {
            return Ok(Arc::clone(store.value()) as Arc<dyn ItemStore>);
        }

        // Registered by another process sharing the same Redis.
        let mut conn = self.connection.clone();
        let known: bool = conn
            .sismember(self.bots_key(), bot.as_str())
            .await
            .map_err(ParleyError::storage)?;
        if !known {
            return Err(ParleyError::not_found("bot", bot.as_str()));
        }
        let store = self
            .stores
            .entry(bot.clone())
            .or_insert_with(|| {
                Arc::new(RedisItemStore::with_connection(
                    self.connection.clone(),
                    &self.namespace,
                    bot,
                ))
            })
            .clone();
        Ok(store as Arc<dyn ItemStore>)
    }

    async fn remove(&self, bot: &TenantId) -> Result<(), ParleyError> {
        self.stores.remove(bot);
        let mut conn = self.connection.clone();
        let removed: usize = conn
            .srem(self.bots_key(), bot.as_str())
            .await
            .map_err(ParleyError::storage)?;
        if removed == 0 {
            return Err(ParleyError::not_found("bot", bot.as_str()));
        }
        Ok(())
    }
}

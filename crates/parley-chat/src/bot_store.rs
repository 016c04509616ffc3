// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Installed bots, one per tenant.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use parley_core::{BotRecord, BotStore, ParleyError, TenantId};

#[derive(Default)]
pub struct MemoryBotStore {
    bots: DashMap<TenantId, BotRecord>,
}

impl MemoryBotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BotStore for MemoryBotStore {
    async fn add_bot(&self, record: BotRecord) -> Result<(), ParleyError> {
        match self.bots.entry(record.tenant.clone()) {
            Entry::Occupied(_) => Err(ParleyError::already_exists("bot", record.tenant.as_str())),
            Entry::Vacant(slot) => {
                debug!(tenant = %record.tenant, "bot stored");
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get_bot(&self, tenant: &TenantId) -> Result<BotRecord, ParleyError> {
        self.bots
            .get(tenant)
            .map(|r| r.clone())
            .ok_or_else(|| ParleyError::not_found("bot", tenant.as_str()))
    }

    async fn remove_bot(&self, tenant: &TenantId) -> Result<(), ParleyError> {
        self.bots
            .remove(tenant)
            .map(|_| ())
            .ok_or_else(|| ParleyError::not_found("bot", tenant.as_str()))
    }

    async fn all_bots(&self) -> Result<Vec<BotRecord>, ParleyError> {
        Ok(self.bots.iter().map(|r| r.value().clone()).collect())
    }
}

/// Bots as JSON values in the hash `{namespace}:chat:bots`, keyed by tenant.
pub struct RedisBotStore {
    key: String,
    connection: ConnectionManager,
}

impl RedisBotStore {
    pub async fn connect(url: &str, namespace: &str) -> Result<Self, ParleyError> {
        let client = redis::Client::open(url).map_err(ParleyError::storage)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(ParleyError::storage)?;
        let key = format!("{namespace}:chat:bots");
        info!(key = %key, "redis bot store connected");
        Ok(Self { key, connection })
    }
}

#[async_trait]
impl BotStore for RedisBotStore {
    async fn add_bot(&self, record: BotRecord) -> Result<(), ParleyError> {
        let body = serde_json::to_string(&record)
            .map_err(|e| ParleyError::Internal(format!("bot record encode: {e}")))?;
        let mut conn = self.connection.clone();
        let added: bool = conn
            .hset_nx(&self.key, record.tenant.as_str(), body)
            .await
            .map_err(ParleyError::storage)?;
        if !added {
            return Err(ParleyError::already_exists("bot", record.tenant.as_str()));
        }
        Ok(())
    }

    async fn get_bot(&self, tenant: &TenantId) -> Result<BotRecord, ParleyError> {
        let mut conn = self.connection.clone();
        let body: Option<String> = conn
            .hget(&self.key, tenant.as_str())
            .await
            .map_err(ParleyError::storage)?;
        let body = body.ok_or_else(|| ParleyError::not_found("bot", tenant.as_str()))?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn remove_bot(&self, tenant: &TenantId) -> Result<(), ParleyError> {
        let mut conn = self.connection.clone();
        let removed: usize = conn
            .hdel(&self.key, tenant.as_str())
            .await
            .map_err(ParleyError::storage)?;
        if removed == 0 {
            return Err(ParleyError::not_found("bot", tenant.as_str()));
        }
        Ok(())
    }

    async fn all_bots(&self) -> Result<Vec<BotRecord>, ParleyError> {
        let mut conn = self.connection.clone();
        let bodies: Vec<String> = conn.hvals(&self.key).await.map_err(ParleyError::storage)?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).map_err(ParleyError::from))
            .collect()
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis-backed conversation store.
//!
//! For a key `tenant:user:room` under namespace `ns`:
//! `{ns}:conversation:{key}` holds the definition id,
//! `{ns}:conversation:{key}:state` the current state and
//! `{ns}:conversation:{key}:data` the scratch hash.
//!
//! `\` and `:` inside the tenant, user and room are backslash-escaped, so
//! the three parts always render as exactly three `:`-separated fields.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use parley_core::{ConversationKey, ConversationStore, ParleyError, escape_key_part};

use crate::definition::START;

pub struct RedisConversationStore {
    namespace: String,
    connection: ConnectionManager,
}

impl RedisConversationStore {
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, ParleyError> {
        let client = redis::Client::open(url).map_err(ParleyError::storage)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(ParleyError::storage)?;
        let namespace = namespace.into();
        info!(namespace = %namespace, "redis conversation store connected");
        Ok(Self {
            namespace,
            connection,
        })
    }

    fn active_key(&self, key: &ConversationKey) -> String {
        format!("{}:conversation:{}", self.namespace, key_path(key))
    }

    fn state_key(&self, key: &ConversationKey) -> String {
        format!("{}:state", self.active_key(key))
    }

    fn data_key(&self, key: &ConversationKey) -> String {
        format!("{}:data", self.active_key(key))
    }

    async fn require_active(&self, key: &ConversationKey) -> Result<(), ParleyError> {
        if self.is_active(key).await? {
            Ok(())
        } else {
            Err(ParleyError::ConversationNotFound)
        }
    }
}

fn key_path(key: &ConversationKey) -> String {
    [
        escape_key_part(&key.tenant.to_string()),
        escape_key_part(&key.user.to_string()),
        escape_key_part(&key.room.to_string()),
    ]
    .join(":")
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn start(&self, key: &ConversationKey, id: &str) -> Result<(), ParleyError> {
        let mut conn = self.connection.clone();
        let created: bool = conn
            .set_nx(self.active_key(key), id)
            .await
            .map_err(ParleyError::storage)?;
        if !created {
            return Err(ParleyError::AlreadyActive(key.to_string()));
        }
        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(self.state_key(key))
            .arg(START)
            .ignore()
            .cmd("DEL")
            .arg(self.data_key(key))
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(ParleyError::storage)
    }

    async fn is_active(&self, key: &ConversationKey) -> Result<bool, ParleyError> {
        let mut conn = self.connection.clone();
        conn.exists(self.active_key(key))
            .await
            .map_err(ParleyError::storage)
    }

    async fn active(&self, key: &ConversationKey) -> Result<(String, String), ParleyError> {
        let mut conn = self.connection.clone();
        let (id, state): (Option<String>, Option<String>) = redis::pipe()
            .cmd("GET")
            .arg(self.active_key(key))
            .cmd("GET")
            .arg(self.state_key(key))
            .query_async(&mut conn)
            .await
            .map_err(ParleyError::storage)?;
        match id {
            Some(id) => Ok((id, state.unwrap_or_else(|| START.to_string()))),
            None => Err(ParleyError::ConversationNotFound),
        }
    }

    async fn set_state(&self, key: &ConversationKey, state: &str) -> Result<(), ParleyError> {
        self.require_active(key).await?;
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(self.state_key(key), state)
            .await
            .map_err(ParleyError::storage)
    }

    async fn set_data(
        &self,
        key: &ConversationKey,
        field: &str,
        value: &str,
    ) -> Result<(), ParleyError> {
        self.require_active(key).await?;
        let mut conn = self.connection.clone();
        conn.hset::<_, _, _, ()>(self.data_key(key), field, value)
            .await
            .map_err(ParleyError::storage)
    }

    async fn get_data(&self, key: &ConversationKey, field: &str) -> Result<String, ParleyError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn
            .hget(self.data_key(key), field)
            .await
            .map_err(ParleyError::storage)?;
        match value {
            Some(value) => Ok(value),
            None => {
                self.require_active(key).await?;
                Err(ParleyError::ItemNotFound)
            }
        }
    }

    async fn end(&self, key: &ConversationKey) -> Result<(), ParleyError> {
        let mut conn = self.connection.clone();
        let (removed,): (usize,) = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(self.active_key(key))
            .cmd("DEL")
            .arg(self.state_key(key))
            .ignore()
            .cmd("DEL")
            .arg(self.data_key(key))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(ParleyError::storage)?;
        if removed == 0 {
            return Err(ParleyError::ConversationNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ids_keep_their_shape() {
        let key = ConversationKey::new("T1", "U1", "D1");
        assert_eq!(key_path(&key), "T1:U1:D1");
    }

    #[test]
    fn colons_inside_ids_cannot_collide() {
        let a = ConversationKey::new("T1:U1", "D1", "x");
        let b = ConversationKey::new("T1", "U1:D1", "x");
        let c = ConversationKey::new("T1", "U1", "D1:x");
        let paths = [key_path(&a), key_path(&b), key_path(&c)];
        assert_eq!(paths[0], "T1\\:U1:D1:x");
        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_ne!(paths[0], paths[2]);
    }

    #[test]
    fn backslashes_are_escaped_too() {
        let a = ConversationKey::new("T\\", "U", "R");
        let b = ConversationKey::new("T", "\\U", "R");
        assert_eq!(key_path(&a), "T\\\\:U:R");
        assert_ne!(key_path(&a), key_path(&b));
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis-backed item store.
//!
//! Key layout, per tenant and thread (the tenant passed through
//! `escape_key_part`):
//!
//! - `{ns}:{tenant}:{thread}` is a sorted set of `{id:020}:{type}` members,
//!   all with score 0 so they sort lexicographically, which for the
//!   zero-padded ids is numeric order.
//! - `{ns}:{tenant}:{thread}:{id}` holds the item as JSON, cursors included.
//!
//! Inserts into one thread are serialized by a per-thread mutex, dropped
//! again once no writer holds it. The neighbour rewrites and the new member
//! are committed in one MULTI block. A thread marker added on a stored
//! message replaces that message's member and body in place.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tracing::debug;

use parley_core::{Item, ItemId, ItemStore, ParleyError, TenantId, escape_key_part};

use crate::link::{is_promotion, link, replace_content, validate};

/// Per-thread write locks, kept only while some writer uses them.
#[derive(Default)]
struct ThreadLocks {
    locks: Mutex<HashMap<ItemId, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    async fn acquire(&self, thread: ItemId) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(thread).or_default().clone()
    }

    /// Hand back `lock`, dropping the entry when nobody else holds or waits on it.
    async fn release(&self, thread: ItemId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // The map's entry and `lock` are the only handles left.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&thread);
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

pub struct RedisItemStore {
    prefix: String,
    connection: ConnectionManager,
    thread_locks: ThreadLocks,
}

impl RedisItemStore {
    /// Open a store for `tenant`, keeping all keys under `namespace`.
    pub async fn connect(
        url: &str,
        namespace: &str,
        tenant: &TenantId,
    ) -> Result<Self, ParleyError> {
        let client = redis::Client::open(url).map_err(ParleyError::storage)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(ParleyError::storage)?;
        Ok(Self::with_connection(manager, namespace, tenant))
    }

    /// Build a store on an existing connection manager.
    pub fn with_connection(
        connection: ConnectionManager,
        namespace: &str,
        tenant: &TenantId,
    ) -> Self {
        Self {
            prefix: format!("{namespace}:{}", escape_key_part(tenant.as_str())),
            connection,
            thread_locks: ThreadLocks::default(),
        }
    }

    fn set_key(&self, thread: ItemId) -> String {
        format!("{}:{}", self.prefix, thread)
    }

    fn item_key(&self, thread: ItemId, id: ItemId) -> String {
        format!("{}:{}:{}", self.prefix, thread, id)
    }

    async fn add_locked(&self, mut item: Item) -> Result<Item, ParleyError> {
        let thread = item.thread_id();
        match self.load(thread, item.id()).await? {
            Some(stored) if is_promotion(&stored, &item) => {
                return self.promote(stored, item).await;
            }
            Some(_) => return Err(ParleyError::already_exists("item", item.id().to_string())),
            None => {}
        }

        let own = member(&item);
        let mut prev = match self.neighbour(thread, &own, true).await? {
            Some(id) => self.load(thread, id).await?,
            None => None,
        };
        let mut next = match self.neighbour(thread, &own, false).await? {
            Some(id) => self.load(thread, id).await?,
            None => None,
        };
        link(&mut item, prev.as_mut(), next.as_mut());

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("ZADD")
            .arg(self.set_key(thread))
            .arg(0)
            .arg(&own)
            .ignore();
        self.write_items(&mut pipe, [Some(&item), prev.as_ref(), next.as_ref()])?;
        let mut conn = self.connection.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(ParleyError::storage)?;

        debug!(id = %item.id(), thread = %thread, "item added");
        Ok(item)
    }

    /// Store a thread marker in place of the message it was opened on.
    async fn promote(&self, stored: Item, mut item: Item) -> Result<Item, ParleyError> {
        let thread = item.thread_id();
        item.set_prev(stored.prev());
        item.set_next(stored.next());
        let cursor = item.cursor();

        let mut prev = match stored.prev() {
            Some(c) => self.load(thread, c.id).await?,
            None => None,
        };
        let mut next = match stored.next() {
            Some(c) => self.load(thread, c.id).await?,
            None => None,
        };
        if let Some(p) = prev.as_mut() {
            p.set_next(Some(cursor));
        }
        if let Some(n) = next.as_mut() {
            n.set_prev(Some(cursor));
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("ZREM")
            .arg(self.set_key(thread))
            .arg(member(&stored))
            .ignore()
            .cmd("ZADD")
            .arg(self.set_key(thread))
            .arg(0)
            .arg(member(&item))
            .ignore();
        self.write_items(&mut pipe, [Some(&item), prev.as_ref(), next.as_ref()])?;
        let mut conn = self.connection.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(ParleyError::storage)?;

        debug!(id = %item.id(), thread = %thread, "message promoted to thread");
        Ok(item)
    }

    fn write_items<'a>(
        &self,
        pipe: &mut redis::Pipeline,
        items: impl IntoIterator<Item = Option<&'a Item>>,
    ) -> Result<(), ParleyError> {
        for item in items.into_iter().flatten() {
            pipe.cmd("SET")
                .arg(self.item_key(item.thread_id(), item.id()))
                .arg(serde_json::to_string(item)?)
                .ignore();
        }
        Ok(())
    }

    async fn update_locked(&self, item: Item) -> Result<(), ParleyError> {
        let thread = item.thread_id();
        let Some(stored) = self.load(thread, item.id()).await? else {
            return Err(self.missing(thread).await);
        };
        let updated = replace_content(&stored, item);
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(
            self.item_key(thread, updated.id()),
            serde_json::to_string(&updated)?,
        )
        .await
        .map_err(ParleyError::storage)
    }

    async fn load(&self, thread: ItemId, id: ItemId) -> Result<Option<Item>, ParleyError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn
            .get(self.item_key(thread, id))
            .await
            .map_err(ParleyError::storage)?;
        raw.map(|json| serde_json::from_str(&json).map_err(ParleyError::from))
            .transpose()
    }

    /// `ThreadNotFound` when the thread's set is empty, else `ItemNotFound`.
    async fn missing(&self, thread: ItemId) -> ParleyError {
        let mut conn = self.connection.clone();
        let count: Result<usize, _> = conn.zcard(self.set_key(thread)).await;
        match count {
            Ok(0) => ParleyError::ThreadNotFound,
            Ok(_) => ParleyError::ItemNotFound,
            Err(e) => ParleyError::storage(e),
        }
    }

    /// The member adjacent to `member`: below it when `before`, else above.
    async fn neighbour(
        &self,
        thread: ItemId,
        member: &str,
        before: bool,
    ) -> Result<Option<ItemId>, ParleyError> {
        let mut conn = self.connection.clone();
        let (command, start, end) = if before {
            ("ZREVRANGEBYLEX", format!("({member}"), "-".to_string())
        } else {
            ("ZRANGEBYLEX", format!("({member}"), "+".to_string())
        };
        let found: Vec<String> = redis::cmd(command)
            .arg(self.set_key(thread))
            .arg(start)
            .arg(end)
            .arg("LIMIT")
            .arg(0)
            .arg(1)
            .query_async(&mut conn)
            .await
            .map_err(ParleyError::storage)?;
        found.first().map(|m| member_id(m)).transpose()
    }
}

fn member(item: &Item) -> String {
    let cursor = item.cursor();
    format!("{:020}:{}", cursor.id.0, cursor.item_type)
}

fn member_id(member: &str) -> Result<ItemId, ParleyError> {
    member
        .split_once(':')
        .and_then(|(id, _)| id.parse::<i64>().ok())
        .map(ItemId)
        .ok_or_else(|| ParleyError::Internal(format!("malformed item member `{member}`")))
}

#[async_trait]
impl ItemStore for RedisItemStore {
    async fn add(&self, item: Item) -> Result<Item, ParleyError> {
        validate(&item)?;
        let item = item.into_stored();
        let thread = item.thread_id();
        let lock = self.thread_locks.acquire(thread).await;
        let result = {
            let _guard = lock.lock().await;
            self.add_locked(item).await
        };
        self.thread_locks.release(thread, lock).await;
        result
    }

    async fn get(&self, id: ItemId, thread: ItemId) -> Result<Item, ParleyError> {
        match self.load(thread, id).await? {
            Some(item) => Ok(item),
            None => Err(self.missing(thread).await),
        }
    }

    async fn update(&self, item: Item) -> Result<(), ParleyError> {
        validate(&item)?;
        let thread = item.thread_id();
        let lock = self.thread_locks.acquire(thread).await;
        let result = {
            let _guard = lock.lock().await;
            self.update_locked(item).await
        };
        self.thread_locks.release(thread, lock).await;
        result
    }

    async fn last(&self, n: usize, thread: ItemId) -> Result<Vec<Item>, ParleyError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection.clone();
        let start = -isize::try_from(n).unwrap_or(isize::MAX);
        let members: Vec<String> = conn
            .zrange(self.set_key(thread), start, -1)
            .await
            .map_err(ParleyError::storage)?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let keys = members
            .iter()
            .map(|m| member_id(m).map(|id| self.item_key(thread, id)))
            .collect::<Result<Vec<_>, _>>()?;
        let bodies: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(ParleyError::storage)?;

        bodies
            .into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(ParleyError::from))
            .collect()
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory item store.
//!
//! Each thread is a `BTreeMap` keyed by id behind its own mutex. The map of
//! threads has a separate `RwLock`, held only long enough to find or create a
//! thread, so inserts into different threads never wait on each other.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use parley_core::{Item, ItemId, ItemStore, ParleyError};

use crate::link::{insert_sorted, is_promotion, promote_in_place, replace_content, validate};

type ItemSet = Arc<Mutex<BTreeMap<ItemId, Item>>>;

#[derive(Default)]
pub struct MemoryItemStore {
    threads: RwLock<HashMap<ItemId, ItemSet>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn thread(&self, thread: ItemId) -> Option<ItemSet> {
        self.threads.read().await.get(&thread).cloned()
    }

    async fn thread_or_create(&self, thread: ItemId) -> ItemSet {
        if let Some(set) = self.thread(thread).await {
            return set;
        }
        self.threads
            .write()
            .await
            .entry(thread)
            .or_default()
            .clone()
    }

    /// Every item of `thread` in ascending id order.
    pub async fn all(&self, thread: ItemId) -> Result<Vec<Item>, ParleyError> {
        let set = self
            .thread(thread)
            .await
            .ok_or(ParleyError::ThreadNotFound)?;
        let set = set.lock().await;
        Ok(set.values().cloned().collect())
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn add(&self, item: Item) -> Result<Item, ParleyError> {
        validate(&item)?;
        let set = self.thread_or_create(item.thread_id()).await;
        let mut set = set.lock().await;
        let item = item.into_stored();
        let promotes = set.get(&item.id()).map(|existing| is_promotion(existing, &item));
        let stored = match promotes {
            Some(true) => promote_in_place(&mut set, item),
            Some(false) => {
                return Err(ParleyError::already_exists("item", item.id().to_string()));
            }
            None => insert_sorted(&mut set, item),
        };
        debug!(id = %stored.id(), thread = %stored.thread_id(), "item added");
        Ok(stored)
    }

    async fn get(&self, id: ItemId, thread: ItemId) -> Result<Item, ParleyError> {
        let set = self
            .thread(thread)
            .await
            .ok_or(ParleyError::ThreadNotFound)?;
        let set = set.lock().await;
        set.get(&id).cloned().ok_or(ParleyError::ItemNotFound)
    }

    async fn update(&self, item: Item) -> Result<(), ParleyError> {
        validate(&item)?;
        let set = self
            .thread(item.thread_id())
            .await
            .ok_or(ParleyError::ThreadNotFound)?;
        let mut set = set.lock().await;
        let id = item.id();
        let stored = set.get(&id).ok_or(ParleyError::ItemNotFound)?;
        let updated = replace_content(stored, item);
        set.insert(id, updated);
        Ok(())
    }

    async fn last(&self, n: usize, thread: ItemId) -> Result<Vec<Item>, ParleyError> {
        let Some(set) = self.thread(thread).await else {
            return Ok(Vec::new());
        };
        let set = set.lock().await;
        let mut items: Vec<Item> = set.values().rev().take(n).cloned().collect();
        items.reverse();
        Ok(items)
    }
}

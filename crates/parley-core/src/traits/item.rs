// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered item store traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::item::{Item, ItemId};
use crate::types::TenantId;

/// Thread-aware ordered storage of items for a single tenant.
///
/// Items of one thread form a doubly linked list ordered by id: walking
/// `next` from the lowest id visits every item once in ascending order and
/// walking `prev` from the highest id visits them in descending order.
#[async_trait]
pub trait ItemStore: Send + Sync + 'static {
    /// Insert `item` into its thread and link it to its neighbours.
    ///
    /// Returns the item with `prev`/`next` set. Fails with `InvalidItem` for
    /// an item without an id and `CannotAddThreadZero` for a thread marker
    /// with id 0.
    async fn add(&self, item: Item) -> Result<Item, ParleyError>;

    /// `ThreadNotFound` when `thread` has no items, `ItemNotFound` when `id`
    /// is not in it.
    async fn get(&self, id: ItemId, thread: ItemId) -> Result<Item, ParleyError>;

    /// Replace the stored content of an existing item, keeping its links.
    async fn update(&self, item: Item) -> Result<(), ParleyError>;

    /// The `n` highest-id items of `thread`, in ascending id order.
    async fn last(&self, n: usize, thread: ItemId) -> Result<Vec<Item>, ParleyError>;
}

/// Maps connected widget bots to their item stores.
#[async_trait]
pub trait ControllerStore: Send + Sync + 'static {
    /// Register `bot` and initialise its item store. `AlreadyExists` on duplicates.
    async fn add(&self, bot: &TenantId) -> Result<(), ParleyError>;

    /// `NotFound` when `bot` was never added or has been removed.
    async fn get(&self, bot: &TenantId) -> Result<Arc<dyn ItemStore>, ParleyError>;

    /// `NotFound` when `bot` is not registered.
    async fn remove(&self, bot: &TenantId) -> Result<(), ParleyError>;
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered, thread-aware item stores.
//!
//! Both backends keep the items of a thread as a doubly linked list ordered
//! by id and return identical cursors for the same sequence of inserts.

pub mod controller;
pub mod link;
pub mod memory;
pub mod redis_store;

pub use controller::{MemoryControllerStore, RedisControllerStore};
pub use memory::MemoryItemStore;
pub use redis_store::RedisItemStore;

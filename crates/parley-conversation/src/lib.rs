// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finite-state conversations for Parley bots.
//!
//! A [`Conversation`] maps state names to async handlers. Definitions are
//! registered by name in a [`ConversationRegistry`] at startup; the
//! [`ConversationEngine`] starts them per (tenant, user, room) and delivers
//! follow-up messages to the current state's handler. Active state and
//! scratch data live in a [`ConversationStore`](parley_core::ConversationStore).

pub mod controls;
pub mod definition;
pub mod engine;
pub mod memory_store;
pub mod redis_store;
pub mod registry;

pub use controls::Controls;
pub use definition::{Conversation, Handler, START};
pub use engine::ConversationEngine;
pub use memory_store::MemoryConversationStore;
pub use redis_store::RedisConversationStore;
pub use registry::ConversationRegistry;

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence and platform traits.
//!
//! Every backend (in-memory, Redis) implements the same trait with the same
//! error semantics, and all traits use `#[async_trait]` so they can be held
//! as `Arc<dyn Trait>`.

pub mod item;
pub mod platform;
pub mod store;

pub use item::{ControllerStore, ItemStore};
pub use platform::PlatformApi;
pub use store::{BotStore, ConversationStore};

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley bot toolkit.
//!
//! This crate provides the error type, the shared data model (tenants,
//! categories, items, chat messages) and the persistence/platform traits that
//! every backend and transport in the workspace implements or consumes.

pub mod chat;
pub mod error;
pub mod item;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use chat::{ChatMessage, RtmMessage};
pub use error::{ErrorHandler, ParleyError, default_error_handler};
pub use item::{Attachment, Cursor, Item, ItemId, ItemSource, ItemType, Message, Thread};
pub use types::{
    BotRecord, Category, ConversationKey, InboundFrame, RoomId, TenantId, UserId, escape_key_part,
};

pub use traits::{BotStore, ControllerStore, ConversationStore, ItemStore, PlatformApi};

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event routing for chat-platform bots.
//!
//! Each decoded event is either claimed by the sender's active conversation
//! or classified into exactly one [`Category`](parley_core::Category) and
//! published on that category's stream.

pub mod classifier;
pub mod dispatcher;
pub mod pool;
pub mod streams;

pub use classifier::{EventKind, classify_chat, event_kind};
pub use dispatcher::{BotIdentity, BotResolver, DispatchSettings, Dispatcher, Routed};
pub use pool::{Job, WorkerPool};
pub use streams::{CategoryStreams, Delivery};

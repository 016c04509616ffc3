// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-platform bots for Parley.
//!
//! A [`ChatController`] keeps one real-time connection per installed bot
//! through a shared multiplexer, routes every event through the dispatcher
//! and hands consumers a [`ChatBot`] for answering. It also accepts event
//! callbacks from the HTTP gateway.

pub mod api;
pub mod bot;
pub mod bot_store;
pub mod controller;

pub use api::{DEFAULT_API_BASE_URL, HttpPlatformApi};
pub use bot::{ChatBot, ChatControls, ChatConversation, ChatEngine, ChatRegistry};
pub use bot_store::{MemoryBotStore, RedisBotStore};
pub use controller::{ChatController, ChatOptions};

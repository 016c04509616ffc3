// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Widget bots over a plain websocket.
//!
//! Every client connection becomes a [`WebBot`] with its own ordered item
//! store. Client messages are stored and echoed back, then go to the active
//! conversation or to the [`WebController::messages`] stream.

pub mod bot;
pub mod controller;
pub mod sanitize;

pub use bot::{WebBot, WebControls, WebConversation, WebEngine, WebRegistry};
pub use controller::{BotIdCreator, WebController, WebMessage, WebOptions, random_bot_id};
pub use sanitize::sanitize;

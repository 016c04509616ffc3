// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-tenant websocket multiplexer for Parley.
//!
//! Holds one long-lived connection per tenant and merges every inbound frame
//! into a single tenant-tagged stream.

pub mod frame;
pub mod multiplexer;

pub use frame::{FrameAction, RECONNECT_URL, TypingFrame, classify_frame};
pub use multiplexer::ConnectionMultiplexer;

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surfaces of a chat platform.
//!
//! Event callbacks are handed to an [`EventSink`] fire-and-forget. Commands
//! and interactions expect an answer: each is published together with a
//! [`Correlation`] and the request waits a bounded time for it before the
//! answer has to go through the platform's response URL.

pub mod auth;
pub mod command;
pub mod correlation;
pub mod events;
pub mod interaction;
pub mod server;

pub use auth::VerificationToken;
pub use command::{Command, CommandData, FieldError};
pub use correlation::{
    Correlation, DEFAULT_IMMEDIATE_RESPONSE_TIMEOUT, DEFAULT_RESPONSE_QUOTA, Outcome,
    PendingResponse,
};
pub use events::{EventEnvelope, EventSink};
pub use interaction::{Action, Interaction, InteractionData, Named, Team};
pub use server::{GatewaySettings, GatewayState, GatewayStreams, gateway};

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slash commands.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use parley_core::{ChatMessage, ParleyError, TenantId};

use crate::correlation::Correlation;

/// Form fields posted for a slash command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandData {
    pub token: String,
    pub team_id: String,
    pub team_domain: String,
    pub enterprise_id: String,
    pub enterprise_name: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user_id: String,
    pub command: String,
    pub text: String,
    pub response_url: String,
    pub trigger_id: String,
}

/// One field error shown next to a dialog element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub name: String,
    pub error: String,
}

impl FieldError {
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorsBody<'a> {
    pub errors: &'a [FieldError],
}

#[derive(Serialize)]
struct CommandResponse<'a> {
    #[serde(flatten)]
    message: &'a ChatMessage,
    response_type: &'static str,
}

impl<'a> CommandResponse<'a> {
    fn new(message: &'a ChatMessage, in_channel: bool) -> Self {
        Self {
            message,
            response_type: if in_channel { "in_channel" } else { "ephemeral" },
        }
    }
}

/// A command invocation waiting for its answer.
pub struct Command {
    data: CommandData,
    correlation: Correlation,
}

impl Command {
    pub fn new(data: CommandData, correlation: Correlation) -> Self {
        Self { data, correlation }
    }

    pub fn data(&self) -> &CommandData {
        &self.data
    }

    pub fn tenant(&self) -> TenantId {
        TenantId::new(self.data.team_id.clone())
    }

    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    /// Answer in the HTTP response, visible to everyone in the room when
    /// `in_channel` is set and only to the invoker otherwise.
    pub fn respond_immediately(&self, msg: &ChatMessage, in_channel: bool) -> Result<(), ParleyError> {
        self.correlation.answer(&CommandResponse::new(msg, in_channel))
    }

    pub fn respond_with_empty_body(&self) -> Result<(), ParleyError> {
        self.correlation.acknowledge()
    }

    pub fn respond_with_errors(&self, errors: &[FieldError]) -> Result<(), ParleyError> {
        self.correlation.answer(&ErrorsBody { errors })
    }

    /// Answer through the response URL; usable a limited number of times.
    pub async fn respond(&self, msg: &ChatMessage, in_channel: bool) -> Result<(), ParleyError> {
        self.correlation
            .post(&CommandResponse::new(msg, in_channel))
            .await
    }
}

impl Deref for Command {
    type Target = CommandData;

    fn deref(&self) -> &CommandData {
        &self.data
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("team_id", &self.data.team_id)
            .field("command", &self.data.command)
            .field("user_id", &self.data.user_id)
            .finish()
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interactive message actions and dialog submissions.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_core::{ChatMessage, ParleyError, TenantId};

use crate::command::{ErrorsBody, FieldError};
use crate::correlation::Correlation;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Team {
    pub id: String,
    pub domain: String,
}

/// A channel or user reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Named {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectedOption {
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Action {
    pub name: String,
    pub value: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub selected_options: Vec<SelectedOption>,
}

/// The JSON carried in the `payload` form field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InteractionData {
    #[serde(rename = "type")]
    pub kind: String,
    pub token: String,
    pub callback_id: String,
    pub team: Team,
    pub channel: Option<Named>,
    pub user: Option<Named>,
    pub actions: Vec<Action>,
    pub action_ts: String,
    pub message_ts: String,
    pub attachment_id: String,
    pub is_app_unfurl: bool,
    pub original_message: Option<ChatMessage>,
    pub response_url: String,
    pub trigger_id: String,
    /// Dialog submission values, kept as raw JSON.
    pub submission: Option<Value>,
}

/// An interaction waiting for its answer.
pub struct Interaction {
    data: InteractionData,
    correlation: Correlation,
}

impl Interaction {
    pub fn new(data: InteractionData, correlation: Correlation) -> Self {
        Self { data, correlation }
    }

    pub fn data(&self) -> &InteractionData {
        &self.data
    }

    pub fn tenant(&self) -> TenantId {
        TenantId::new(self.data.team.id.clone())
    }

    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    /// Replace the original message with `msg` in the HTTP response.
    pub fn respond_immediately(&self, msg: &ChatMessage) -> Result<(), ParleyError> {
        self.correlation.answer(msg)
    }

    pub fn respond_with_empty_body(&self) -> Result<(), ParleyError> {
        self.correlation.acknowledge()
    }

    /// Reject a dialog submission with per-field errors.
    pub fn respond_with_errors(&self, errors: &[FieldError]) -> Result<(), ParleyError> {
        self.correlation.answer(&ErrorsBody { errors })
    }

    pub async fn respond(&self, msg: &ChatMessage) -> Result<(), ParleyError> {
        self.correlation.post(msg).await
    }
}

impl Deref for Interaction {
    type Target = InteractionData;

    fn deref(&self) -> &InteractionData {
        &self.data
    }
}

impl std::fmt::Debug for Interaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interaction")
            .field("type", &self.data.kind)
            .field("callback_id", &self.data.callback_id)
            .field("team", &self.data.team.id)
            .finish()
    }
}

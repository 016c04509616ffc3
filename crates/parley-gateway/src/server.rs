// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway routes built on axum.
//!
//! - `POST /slack/events`: event-callback envelopes and URL verification
//! - `POST /slack/commands`: slash commands (form body)
//! - `POST /slack/interactions`: interactive actions (form body with `payload`)
//! - `GET /health`

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use parley_core::{ParleyError, TenantId};

use crate::auth::VerificationToken;
use crate::command::{Command, CommandData};
use crate::correlation::{
    Correlation, DEFAULT_IMMEDIATE_RESPONSE_TIMEOUT, DEFAULT_RESPONSE_QUOTA, Outcome,
    PendingResponse,
};
use crate::events::{EventEnvelope, EventSink};
use crate::interaction::{Interaction, InteractionData};

/// Gateway settings (mirrors the `[chat]` section of the config file).
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub verification_token: Option<String>,
    pub immediate_response_timeout: Duration,
    pub response_quota: u8,
    /// Buffered commands and interactions before new ones are refused.
    pub stream_capacity: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            verification_token: None,
            immediate_response_timeout: DEFAULT_IMMEDIATE_RESPONSE_TIMEOUT,
            response_quota: DEFAULT_RESPONSE_QUOTA,
            stream_capacity: 64,
        }
    }
}

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    token: VerificationToken,
    timeout: Duration,
    quota: u8,
    sink: Arc<dyn EventSink>,
    commands: mpsc::Sender<Command>,
    interactions: mpsc::Sender<Interaction>,
    http: reqwest::Client,
}

/// Consumer ends of the command and interaction streams.
pub struct GatewayStreams {
    pub commands: mpsc::Receiver<Command>,
    pub interactions: mpsc::Receiver<Interaction>,
}

/// Build the gateway routes and the streams their requests are published on.
pub fn gateway(
    settings: GatewaySettings,
    sink: Arc<dyn EventSink>,
    http: reqwest::Client,
) -> (Router, GatewayStreams) {
    let capacity = settings.stream_capacity.max(1);
    let (commands_tx, commands) = mpsc::channel(capacity);
    let (interactions_tx, interactions) = mpsc::channel(capacity);

    let state = GatewayState {
        token: VerificationToken::new(settings.verification_token),
        timeout: settings.immediate_response_timeout,
        quota: settings.response_quota,
        sink,
        commands: commands_tx,
        interactions: interactions_tx,
        http,
    };

    let router = Router::new()
        .route("/health", get(health))
        .route("/slack/events", post(events))
        .route("/slack/commands", post(commands_handler))
        .route("/slack/interactions", post(interactions_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    (
        router,
        GatewayStreams {
            commands,
            interactions,
        },
    )
}

async fn health() -> &'static str {
    "ok"
}

/// POST /slack/events
async fn events(State(state): State<GatewayState>, body: Bytes) -> Response {
    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "malformed event payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    if !state.token.accepts(&envelope.token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match envelope.kind.as_str() {
        "url_verification" => envelope.challenge.into_response(),
        "event_callback" => {
            let Some(event) = envelope.event else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            let tenant = TenantId::new(envelope.team_id);
            match state.sink.handle_event(&tenant, event).await {
                Ok(()) => StatusCode::OK.into_response(),
                Err(e) => error_response(&e),
            }
        }
        other => {
            debug!(kind = other, "ignoring event envelope");
            StatusCode::OK.into_response()
        }
    }
}

/// POST /slack/commands
async fn commands_handler(
    State(state): State<GatewayState>,
    Form(data): Form<CommandData>,
) -> Response {
    if !state.token.accepts(&data.token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if data.response_url.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    info!(team = %data.team_id, command = %data.command, "command received");
    let (correlation, pending) = state.correlation(&data.response_url);
    let command = Command::new(data, correlation);
    if !publish(&state.commands, command, "command") {
        return StatusCode::OK.into_response();
    }
    wait(pending, state.timeout).await
}

#[derive(Debug, Default, Deserialize)]
struct InteractionForm {
    #[serde(default)]
    payload: String,
}

/// POST /slack/interactions
async fn interactions_handler(
    State(state): State<GatewayState>,
    Form(form): Form<InteractionForm>,
) -> Response {
    let data: InteractionData = match serde_json::from_str(&form.payload) {
        Ok(data) => data,
        Err(e) => {
            warn!(error = %e, "malformed interaction payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    if !state.token.accepts(&data.token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let tenant = TenantId::new(data.team.id.clone());
    match state.sink.has_bot(&tenant).await {
        Ok(true) => {}
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => return error_response(&e),
    }

    info!(team = %tenant, callback_id = %data.callback_id, "interaction received");
    let (correlation, pending) = state.correlation(&data.response_url);
    let interaction = Interaction::new(data, correlation);
    if !publish(&state.interactions, interaction, "interaction") {
        return StatusCode::OK.into_response();
    }
    wait(pending, state.timeout).await
}

impl GatewayState {
    fn correlation(&self, response_url: &str) -> (Correlation, PendingResponse) {
        Correlation::new(
            Some(response_url.to_string()),
            self.quota,
            self.http.clone(),
        )
    }
}

fn publish<T>(tx: &mpsc::Sender<T>, item: T, what: &'static str) -> bool {
    match tx.try_send(item) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(kind = what, "consumer stream full, acknowledging without an answer");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(kind = what, "no consumer, acknowledging without an answer");
            false
        }
    }
}

async fn wait(pending: PendingResponse, timeout: Duration) -> Response {
    match pending.wait(timeout).await {
        Outcome::Body(body) => (StatusCode::OK, Json(body)).into_response(),
        Outcome::Empty | Outcome::Accepted => StatusCode::OK.into_response(),
    }
}

fn error_response(err: &ParleyError) -> Response {
    let status = match err {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        ParleyError::InvalidInput(_) | ParleyError::Decode { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(error = %err, status = %status, "gateway request failed");
    status.into_response()
}

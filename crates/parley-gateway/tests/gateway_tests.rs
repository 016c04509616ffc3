// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway routes end to end through the axum router.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley_core::{ChatMessage, ParleyError, RtmMessage, TenantId};
use parley_gateway::{EventSink, FieldError, GatewaySettings, GatewayStreams, gateway};

const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(TenantId, RtmMessage)>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn handle_event(&self, tenant: &TenantId, event: RtmMessage) -> Result<(), ParleyError> {
        if tenant.as_str() != "T1" {
            return Err(ParleyError::not_found("bot", tenant.as_str()));
        }
        self.events.lock().unwrap().push((tenant.clone(), event));
        Ok(())
    }

    async fn has_bot(&self, tenant: &TenantId) -> Result<bool, ParleyError> {
        Ok(tenant.as_str() == "T1")
    }
}

fn app() -> (Router, GatewayStreams, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let settings = GatewaySettings {
        verification_token: Some("verify".into()),
        ..GatewaySettings::default()
    };
    let (router, streams) = gateway(settings, sink.clone(), reqwest::Client::new());
    (router, streams, sink)
}

fn form(pairs: &[(&str, &str)]) -> String {
    fn enc(s: &str) -> String {
        s.chars()
            .map(|c| match c {
                '%' => "%25".to_string(),
                '&' => "%26".to_string(),
                '=' => "%3D".to_string(),
                '+' => "%2B".to_string(),
                ' ' => "%20".to_string(),
                '#' => "%23".to_string(),
                c => c.to_string(),
            })
            .collect()
    }
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", enc(k), enc(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn post_form(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .unwrap()
        .to_vec()
}

fn command_form(response_url: &str) -> String {
    form(&[
        ("token", "verify"),
        ("team_id", "T1"),
        ("channel_id", "C1"),
        ("user_id", "U1"),
        ("command", "/deploy"),
        ("text", "prod now"),
        ("response_url", response_url),
    ])
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _streams, _sink) = app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let (app, _streams, _sink) = app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/slack/events",
            json!({"token": "verify", "type": "url_verification", "challenge": "abc123"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"abc123");

    let response = app
        .oneshot(post_json(
            "/slack/events",
            json!({"token": "wrong", "type": "url_verification", "challenge": "abc123"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_event_is_bad_request() {
    let (app, _streams, _sink) = app();
    let request = Request::builder()
        .method("POST")
        .uri("/slack/events")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_callback_reaches_the_sink() {
    let (app, _streams, sink) = app();
    let event = json!({"type": "message", "channel": "D1", "user": "U1", "text": "hi"});
    let response = app
        .clone()
        .oneshot(post_json(
            "/slack/events",
            json!({"token": "verify", "type": "event_callback", "team_id": "T1", "event": event}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    {
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, TenantId::new("T1"));
        assert_eq!(events[0].1.text, "hi");
    }

    let response = app
        .oneshot(post_json(
            "/slack/events",
            json!({"token": "verify", "type": "event_callback", "team_id": "T9", "event": event}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn command_answered_immediately() {
    let (app, mut streams, _sink) = app();
    let consumer = tokio::spawn(async move {
        let cmd = streams.commands.recv().await.unwrap();
        assert_eq!(cmd.command, "/deploy");
        assert_eq!(cmd.text, "prod now");
        cmd.respond_immediately(&ChatMessage::text("deploying"), false)
            .unwrap();
    });

    let response = app
        .oneshot(post_form(
            "/slack/commands",
            command_form("http://127.0.0.1:9/hook"),
        ))
        .await
        .unwrap();
    consumer.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["text"], "deploying");
    assert_eq!(body["response_type"], "ephemeral");
}

#[tokio::test]
async fn command_acknowledged_without_body() {
    let (app, mut streams, _sink) = app();
    let consumer = tokio::spawn(async move {
        let cmd = streams.commands.recv().await.unwrap();
        cmd.respond_with_empty_body().unwrap();
    });
    let response = app
        .oneshot(post_form(
            "/slack/commands",
            command_form("http://127.0.0.1:9/hook"),
        ))
        .await
        .unwrap();
    consumer.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn silent_command_is_accepted_after_timeout() {
    let (app, mut streams, _sink) = app();
    let response = app
        .oneshot(post_form(
            "/slack/commands",
            command_form("http://127.0.0.1:9/hook"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());

    // The consumer still holds the command after the request returned.
    let cmd = streams.commands.recv().await.unwrap();
    assert_eq!(cmd.correlation().responses_used(), 0);
}

#[tokio::test]
async fn command_rejections() {
    let (app, _streams, _sink) = app();
    let response = app
        .clone()
        .oneshot(post_form(
            "/slack/commands",
            form(&[("token", "verify"), ("team_id", "T1"), ("command", "/x")]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_form(
            "/slack/commands",
            form(&[
                ("token", "nope"),
                ("team_id", "T1"),
                ("response_url", "http://127.0.0.1:9/hook"),
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn response_url_quota_is_five() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({"response_type": "in_channel"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(5)
        .mount(&server)
        .await;

    let settings = GatewaySettings {
        verification_token: Some("verify".into()),
        immediate_response_timeout: Duration::from_millis(20),
        ..GatewaySettings::default()
    };
    let (app, mut streams) = gateway(
        settings,
        Arc::new(RecordingSink::default()),
        reqwest::Client::new(),
    );

    let url = format!("{}/hook", server.uri());
    let response = app
        .oneshot(post_form("/slack/commands", command_form(&url)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cmd = streams.commands.recv().await.unwrap();
    for n in 1..=5u8 {
        cmd.respond(&ChatMessage::text(format!("update {n}")), true)
            .await
            .unwrap();
        assert_eq!(cmd.correlation().responses_used(), n);
    }
    let err = cmd
        .respond(&ChatMessage::text("one too many"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::QuotaExceeded { limit: 5 }));
}

#[tokio::test]
async fn failed_post_does_not_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (correlation, _pending) = parley_gateway::Correlation::new(
        Some(format!("{}/hook", server.uri())),
        5,
        reqwest::Client::new(),
    );
    let err = correlation.post(&json!({"text": "x"})).await.unwrap_err();
    assert!(matches!(err, ParleyError::Http { .. }));
    assert_eq!(correlation.responses_used(), 0);
}

fn interaction_form(team: &str, token: &str) -> String {
    let payload = json!({
        "type": "dialog_submission",
        "token": token,
        "callback_id": "ticket",
        "team": {"id": team, "domain": "acme"},
        "user": {"id": "U1", "name": "ada"},
        "channel": {"id": "C1", "name": "general"},
        "submission": {"title": ""},
        "response_url": "http://127.0.0.1:9/hook"
    });
    form(&[("payload", payload.to_string().as_str())])
}

#[tokio::test]
async fn interaction_answered_with_errors() {
    let (app, mut streams, _sink) = app();
    let consumer = tokio::spawn(async move {
        let interaction = streams.interactions.recv().await.unwrap();
        assert_eq!(interaction.tenant(), TenantId::new("T1"));
        assert_eq!(interaction.callback_id, "ticket");
        interaction
            .respond_with_errors(&[FieldError::new("title", "required")])
            .unwrap();
    });

    let response = app
        .oneshot(post_form(
            "/slack/interactions",
            interaction_form("T1", "verify"),
        ))
        .await
        .unwrap();
    consumer.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, json!({"errors": [{"name": "title", "error": "required"}]}));
}

#[tokio::test]
async fn interaction_rejections() {
    let (app, _streams, _sink) = app();
    let unknown = app
        .clone()
        .oneshot(post_form(
            "/slack/interactions",
            interaction_form("T9", "verify"),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let bad_token = app
        .clone()
        .oneshot(post_form(
            "/slack/interactions",
            interaction_form("T1", "nope"),
        ))
        .await
        .unwrap();
    assert_eq!(bad_token.status(), StatusCode::UNAUTHORIZED);

    let malformed = app
        .oneshot(post_form(
            "/slack/interactions",
            form(&[("payload", "{broken")]),
        ))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

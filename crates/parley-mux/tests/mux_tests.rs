// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the connection multiplexer against loopback servers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley_core::{ErrorHandler, ParleyError, TenantId};
use parley_mux::ConnectionMultiplexer;
use parley_test_utils::TestWsServer;

fn recording_handler() -> (ErrorHandler, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: ErrorHandler = Arc::new(move |err: ParleyError| {
        sink.lock().unwrap().push(err.to_string());
    });
    (handler, seen)
}

async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn frames_are_tagged_with_their_tenant() {
    let mut a = TestWsServer::start().await.unwrap();
    let mut b = TestWsServer::start().await.unwrap();
    let mux = ConnectionMultiplexer::new();

    mux.open(TenantId::from("TA"), a.url()).await.unwrap();
    mux.open(TenantId::from("TB"), b.url()).await.unwrap();
    let mut conn_a = a.accept().await;
    let mut conn_b = b.accept().await;

    conn_a.send_text(r#"{"type":"message","text":"from a"}"#).await;
    let frame = mux.next_frame().await.unwrap();
    assert_eq!(frame.tenant, TenantId::from("TA"));
    assert!(frame.payload.contains("from a"));

    conn_b.send_text(r#"{"type":"message","text":"from b"}"#).await;
    let frame = mux.next_frame().await.unwrap();
    assert_eq!(frame.tenant, TenantId::from("TB"));

    mux.close().await;
}

#[tokio::test]
async fn reconnect_frame_updates_endpoint_and_is_swallowed() {
    let mut server = TestWsServer::start().await.unwrap();
    let mux = ConnectionMultiplexer::new();
    let tenant = TenantId::from("T1");

    mux.open(tenant.clone(), server.url()).await.unwrap();
    let mut conn = server.accept().await;

    conn.send_text(r#"{"type":"reconnect_url","url":"wss://next.example/rtm"}"#)
        .await;
    conn.send_text(r#"{"type":"message","text":"after"}"#).await;

    let frame = mux.next_frame().await.unwrap();
    assert_eq!(frame.tenant, tenant);
    assert!(frame.payload.contains("after"));
    assert_eq!(
        mux.endpoint(&tenant).await.as_deref(),
        Some("wss://next.example/rtm")
    );

    mux.close().await;
}

#[tokio::test]
async fn frames_keep_per_connection_order() {
    let mut server = TestWsServer::start().await.unwrap();
    let mux = ConnectionMultiplexer::new();
    mux.open(TenantId::from("T1"), server.url()).await.unwrap();
    let mut conn = server.accept().await;

    for i in 0..20 {
        conn.send_text(format!(r#"{{"seq":{i}}}"#)).await;
    }
    for i in 0..20 {
        let frame = mux.next_frame().await.unwrap();
        assert_eq!(frame.payload, format!(r#"{{"seq":{i}}}"#));
    }

    mux.close().await;
}

#[tokio::test]
async fn send_reaches_the_tenant_socket() {
    let mut server = TestWsServer::start().await.unwrap();
    let mux = ConnectionMultiplexer::new();
    let tenant = TenantId::from("T1");
    mux.open(tenant.clone(), server.url()).await.unwrap();
    let mut conn = server.accept().await;

    mux.send(&tenant, r#"{"hello":true}"#.to_string())
        .await
        .unwrap();
    assert_eq!(conn.recv_text().await.as_deref(), Some(r#"{"hello":true}"#));

    mux.typing(&tenant, "C42").await.unwrap();
    let typing = conn.recv_json().await.unwrap();
    assert_eq!(typing["type"], "typing");
    assert_eq!(typing["channel"], "C42");

    let err = mux
        .send(&TenantId::from("nobody"), "{}".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::NotFound { .. }));

    mux.close().await;
}

#[tokio::test]
async fn second_open_for_same_tenant_is_rejected() {
    let mut server = TestWsServer::start().await.unwrap();
    let mux = ConnectionMultiplexer::new();
    let tenant = TenantId::from("T1");

    mux.open(tenant.clone(), server.url()).await.unwrap();
    let _conn = server.accept().await;

    let err = mux.open(tenant.clone(), server.url()).await.unwrap_err();
    assert!(matches!(err, ParleyError::AlreadyConnected(_)));
    assert!(mux.is_connected(&tenant).await);

    mux.close().await;
}

#[tokio::test]
async fn abrupt_drop_reports_and_removes_connection() {
    let mut server = TestWsServer::start().await.unwrap();
    let (handler, seen) = recording_handler();
    let mux = ConnectionMultiplexer::with_error_handler(handler);
    let tenant = TenantId::from("T1");

    mux.open(tenant.clone(), server.url()).await.unwrap();
    let conn = server.accept().await;
    conn.drop_abruptly();

    let probe = Arc::clone(&seen);
    wait_until(move || !probe.lock().unwrap().is_empty()).await;
    assert!(seen.lock().unwrap()[0].contains("T1"));

    for _ in 0..100 {
        if !mux.is_connected(&tenant).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!mux.is_connected(&tenant).await);

    // The tenant can be reconnected once the old connection is gone.
    mux.open(tenant.clone(), server.url()).await.unwrap();
    let _conn = server.accept().await;
    mux.close().await;
}

#[tokio::test]
async fn clean_close_removes_without_error() {
    let mut server = TestWsServer::start().await.unwrap();
    let (handler, seen) = recording_handler();
    let mux = ConnectionMultiplexer::with_error_handler(handler);
    let tenant = TenantId::from("T1");

    mux.open(tenant.clone(), server.url()).await.unwrap();
    server.accept().await.close().await;

    for _ in 0..100 {
        if !mux.is_connected(&tenant).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!mux.is_connected(&tenant).await);
    assert!(seen.lock().unwrap().is_empty());
    mux.close().await;
}

#[tokio::test]
async fn undecodable_frame_is_reported_and_dropped() {
    let mut server = TestWsServer::start().await.unwrap();
    let (handler, seen) = recording_handler();
    let mux = ConnectionMultiplexer::with_error_handler(handler);

    mux.open(TenantId::from("T1"), server.url()).await.unwrap();
    let mut conn = server.accept().await;

    conn.send_text("this is not json").await;
    conn.send_text(r#"{"type":"message"}"#).await;

    let frame = mux.next_frame().await.unwrap();
    assert_eq!(frame.payload, r#"{"type":"message"}"#);
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(seen.lock().unwrap()[0].starts_with("decode error"));

    mux.close().await;
}

#[tokio::test]
async fn close_ends_the_stream() {
    let mut server = TestWsServer::start().await.unwrap();
    let mux = ConnectionMultiplexer::new();
    mux.open(TenantId::from("T1"), server.url()).await.unwrap();
    let _conn = server.accept().await;

    mux.close().await;
    assert!(mux.next_frame().await.is_none());
    assert!(mux.tenants().await.is_empty());
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides mock adapters and loopback servers for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockPlatformApi`] - Mock chat REST API with captured calls
//! - [`TestWsServer`] - Loopback websocket server standing in for a tenant endpoint
//! - [`redis_test_url`] - Opt-in Redis endpoint for remote-store tests

pub mod mock_platform;
pub mod ws_server;

pub use mock_platform::{MockPlatformApi, RecordedCall};
pub use ws_server::{ServerConnection, TestWsServer};

/// Environment variable naming a disposable Redis instance.
pub const REDIS_URL_ENV: &str = "PARLEY_TEST_REDIS_URL";

/// The Redis URL for remote-store tests, when one was provided.
///
/// Tests that need Redis return early when this is `None`, so the suite
/// stays runnable without external services.
pub fn redis_test_url() -> Option<String> {
    std::env::var(REDIS_URL_ENV).ok().filter(|u| !u.is_empty())
}

/// A namespace unique to one test, for keeping Redis keys apart.
pub fn unique_namespace(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{prefix}-{nanos}-{}",
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley bot toolkit.

use std::sync::Arc;

use thiserror::Error;
use tracing::error;

/// Boxed foreign error carried as a source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all Parley stores, transports and engines.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A tenant, connection, bot or conversation definition is absent.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Duplicate registration (bot, conversation definition, controller entry).
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// A conversation is already running for the (tenant, user, room) key.
    #[error("conversation already active for {0}")]
    AlreadyActive(String),

    /// A second connection was opened for a tenant that already has one.
    #[error("tenant {0} already has an open connection")]
    AlreadyConnected(String),

    /// No active conversation (or scratch key space) exists for the key.
    #[error("conversation not found")]
    ConversationNotFound,

    /// The requested item (or scratch data key) was never stored.
    #[error("item not found")]
    ItemNotFound,

    /// The requested thread has no items.
    #[error("thread not found")]
    ThreadNotFound,

    /// An item without an id was handed to a store.
    #[error("invalid item")]
    InvalidItem,

    /// Thread id 0 is the root list and cannot be inserted as a marker.
    #[error("cannot add a thread with id 0")]
    CannotAddThreadZero,

    /// Rejected input (missing field, unknown state, malformed request).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The deferred-response path of a correlation was used too often.
    #[error("response quota of {limit} exceeded")]
    QuotaExceeded { limit: u8 },

    /// Unexpected read or write failure on a tenant's duplex connection.
    #[error("transport error for tenant {tenant}: {source}")]
    Transport { tenant: String, source: BoxError },

    /// An inbound payload could not be decoded.
    #[error("decode error: {source}")]
    Decode { source: BoxError },

    /// Storage backend errors (remote KV connection, command failure).
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// Outbound HTTP failures (platform REST calls, response URLs).
    #[error("http error: {message}")]
    Http {
        message: String,
        source: Option<BoxError>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Shorthand for [`ParleyError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for [`ParleyError::AlreadyExists`].
    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    pub fn decode(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Decode {
            source: Box::new(err),
        }
    }

    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }

    pub fn transport(
        tenant: impl Into<String>,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            tenant: tenant.into(),
            source: Box::new(err),
        }
    }

    /// Returns true for the "absent" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::ConversationNotFound
                | Self::ItemNotFound
                | Self::ThreadNotFound
        )
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err)
    }
}

/// Operator-supplied callback for errors that are not a result of a caller action:
/// broken connections, undecodable frames, dropped deliveries.
pub type ErrorHandler = Arc<dyn Fn(ParleyError) + Send + Sync>;

/// The handler used when none is configured: log and keep running.
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|err| {
        error!(error = %err, "unhandled parley error");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_family() {
        assert!(ParleyError::ItemNotFound.is_not_found());
        assert!(ParleyError::ThreadNotFound.is_not_found());
        assert!(ParleyError::ConversationNotFound.is_not_found());
        assert!(ParleyError::not_found("bot", "T1").is_not_found());
        assert!(!ParleyError::InvalidItem.is_not_found());
        assert!(!ParleyError::AlreadyActive("k".into()).is_not_found());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            ParleyError::not_found("bot", "T42").to_string(),
            "bot not found: T42"
        );
        assert_eq!(
            ParleyError::QuotaExceeded { limit: 5 }.to_string(),
            "response quota of 5 exceeded"
        );
        let err = ParleyError::transport("T1", std::io::Error::other("reset"));
        assert_eq!(err.to_string(), "transport error for tenant T1: reset");
    }

    #[test]
    fn serde_errors_become_decode() {
        let err: ParleyError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ParleyError::Decode { .. }));
    }

    #[tracing_test::traced_test]
    #[test]
    fn default_handler_logs() {
        let handler = default_error_handler();
        handler(ParleyError::Internal("boom".into()));
        assert!(logs_contain("unhandled parley error"));
    }
}

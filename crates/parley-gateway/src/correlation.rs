// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pairs one inbound HTTP request with the consumer that answers it.
//!
//! The HTTP handler keeps a [`PendingResponse`] and waits on it for a bounded
//! time; the consumer holds the [`Correlation`] and either answers in time
//! through the response slot or later through the platform's response URL.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use parley_core::ParleyError;

/// How often a response URL may be used for one request.
pub const DEFAULT_RESPONSE_QUOTA: u8 = 5;

/// How long the HTTP handler waits for an immediate answer.
pub const DEFAULT_IMMEDIATE_RESPONSE_TIMEOUT: Duration = Duration::from_millis(2000);

enum Reply {
    Body(Value),
    Empty,
}

/// What the HTTP caller observes. Exactly one per request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The consumer answered with this JSON body.
    Body(Value),
    /// The consumer closed the slot without a body.
    Empty,
    /// Nothing arrived in time (or the consumer went away); the request is
    /// acknowledged and any answer must use the response URL.
    Accepted,
}

/// The HTTP side of a correlation.
pub struct PendingResponse {
    rx: oneshot::Receiver<Reply>,
}

impl PendingResponse {
    pub async fn wait(self, timeout: Duration) -> Outcome {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(Reply::Body(body))) => Outcome::Body(body),
            Ok(Ok(Reply::Empty)) => Outcome::Empty,
            Ok(Err(_)) => {
                debug!("correlation dropped without an answer");
                Outcome::Accepted
            }
            Err(_) => Outcome::Accepted,
        }
    }
}

/// The consumer side of a correlation.
pub struct Correlation {
    slot: Mutex<Option<oneshot::Sender<Reply>>>,
    response_url: Option<String>,
    used: AtomicU8,
    quota: u8,
    http: reqwest::Client,
}

impl Correlation {
    pub fn new(
        response_url: Option<String>,
        quota: u8,
        http: reqwest::Client,
    ) -> (Self, PendingResponse) {
        let (tx, rx) = oneshot::channel();
        let correlation = Self {
            slot: Mutex::new(Some(tx)),
            response_url: response_url.filter(|u| !u.is_empty()),
            used: AtomicU8::new(0),
            quota,
            http,
        };
        (correlation, PendingResponse { rx })
    }

    /// Answer the waiting request with `body`.
    ///
    /// Fails with `InvalidInput` when the slot was already used. Answering
    /// after the wait timed out is not an error; the body is discarded.
    pub fn answer<T: Serialize>(&self, body: &T) -> Result<(), ParleyError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ParleyError::InvalidInput(format!("unserializable response: {e}")))?;
        self.fill(Reply::Body(body))
    }

    /// Acknowledge the waiting request with no body.
    pub fn acknowledge(&self) -> Result<(), ParleyError> {
        self.fill(Reply::Empty)
    }

    fn fill(&self, reply: Reply) -> Result<(), ParleyError> {
        let tx = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ParleyError::InvalidInput("response already sent".into()))?;
        if tx.send(reply).is_err() {
            debug!("immediate response arrived after the request was acknowledged");
        }
        Ok(())
    }

    /// Uses of the response URL so far.
    pub fn responses_used(&self) -> u8 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn response_url(&self) -> Option<&str> {
        self.response_url.as_deref()
    }

    /// POST `body` to the response URL.
    ///
    /// Each successful use counts against the quota; once it is used up the
    /// call fails with `QuotaExceeded` without sending anything.
    pub async fn post<T: Serialize>(&self, body: &T) -> Result<(), ParleyError> {
        let url = self
            .response_url
            .as_deref()
            .ok_or_else(|| ParleyError::InvalidInput("request has no response_url".into()))?;

        let quota = self.quota;
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < quota).then_some(n + 1)
            })
            .map_err(|_| ParleyError::QuotaExceeded { limit: quota })?;

        let result = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .and_then(|res| res.error_for_status());
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                // Failed attempts do not count.
                self.used.fetch_sub(1, Ordering::SeqCst);
                warn!(error = %e, "response url post failed");
                Err(ParleyError::Http {
                    message: format!("response url post failed: {e}"),
                    source: Some(Box::new(e)),
                })
            }
        }
    }
}

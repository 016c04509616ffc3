// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation definitions: named states mapped to async handlers.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use parley_core::ParleyError;

use crate::controls::Controls;

/// Name of the state every conversation begins in.
pub const START: &str = "start";

/// A state handler: receives the triggering message and the controls bound
/// to the conversation's (bot, user, room).
pub type Handler<M, B> =
    Arc<dyn Fn(M, Controls<B>) -> BoxFuture<'static, Result<(), ParleyError>> + Send + Sync>;

struct State<M, B> {
    handler: Handler<M, B>,
    targets: Vec<String>,
}

/// A finite-state conversation template.
///
/// ```
/// # use parley_conversation::Conversation;
/// let greet = Conversation::<String, ()>::new()
///     .on("start", |_msg, ctl| async move { ctl.to("name").await })
///     .transitions("start", ["name"])
///     .on("name", |msg, ctl| async move {
///         ctl.set("name", &msg).await?;
///         ctl.end().await
///     });
/// assert!(greet.validate().is_ok());
/// ```
pub struct Conversation<M, B> {
    states: HashMap<String, State<M, B>>,
    names: Arc<BTreeSet<String>>,
}

impl<M, B> Default for Conversation<M, B> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
            names: Arc::new(BTreeSet::new()),
        }
    }
}

impl<M, B> Conversation<M, B>
where
    M: Send + 'static,
    B: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `state`, replacing any previous handler.
    pub fn on<F, Fut>(mut self, state: impl Into<String>, handler: F) -> Self
    where
        F: Fn(M, Controls<B>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ParleyError>> + Send + 'static,
    {
        let state = state.into();
        let handler: Handler<M, B> = Arc::new(move |msg, controls| Box::pin(handler(msg, controls)));
        let targets = self
            .states
            .remove(&state)
            .map(|s| s.targets)
            .unwrap_or_default();
        Arc::make_mut(&mut self.names).insert(state.clone());
        self.states.insert(state, State { handler, targets });
        self
    }

    /// Declare the states `state` may move to, checked at registration.
    ///
    /// Has no effect when `state` has no handler yet.
    pub fn transitions<I, S>(mut self, state: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(entry) = self.states.get_mut(state) {
            entry.targets.extend(targets.into_iter().map(Into::into));
        }
        self
    }
}

impl<M, B> Conversation<M, B> {
    pub fn handler(&self, state: &str) -> Option<Handler<M, B>> {
        self.states.get(state).map(|s| Arc::clone(&s.handler))
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    /// Names of every state, shared with the controls handed to handlers.
    pub fn state_names(&self) -> Arc<BTreeSet<String>> {
        Arc::clone(&self.names)
    }

    /// Require a `start` state and known transition targets.
    pub fn validate(&self) -> Result<(), ParleyError> {
        if !self.has_state(START) {
            return Err(ParleyError::InvalidInput(
                "conversation has no \"start\" state".into(),
            ));
        }
        for (name, state) in &self.states {
            if let Some(unknown) = state.targets.iter().find(|t| !self.has_state(t)) {
                return Err(ParleyError::InvalidInput(format!(
                    "state \"{name}\" transitions to unknown state \"{unknown}\""
                )));
            }
        }
        Ok(())
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes decoded events to the active conversation or a category stream.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use parley_conversation::ConversationEngine;
use parley_core::{
    Category, ConversationKey, ErrorHandler, InboundFrame, ParleyError, RtmMessage, TenantId,
    UserId,
};

use crate::classifier::{EventKind, classify_chat, event_kind};
use crate::pool::WorkerPool;
use crate::streams::{CategoryStreams, Delivery};

/// A bot handle that knows its own user id.
pub trait BotIdentity: Clone + Send + Sync + 'static {
    fn bot_user_id(&self) -> &UserId;
}

/// Looks up the bot installed for a tenant.
#[async_trait]
pub trait BotResolver<B>: Send + Sync + 'static {
    /// `NotFound` when the tenant has no bot.
    async fn resolve(&self, tenant: &TenantId) -> Result<B, ParleyError>;
}

/// Stream and pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub stream_capacity: usize,
    pub workers: usize,
    pub queue_depth: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            stream_capacity: 256,
            workers: 8,
            queue_depth: 1024,
        }
    }
}

/// Where an event went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Queued for the active conversation's current state.
    Conversation,
    /// Offered to a category stream; `false` when the stream dropped it.
    Category(Category, bool),
    Ignored,
}

pub struct Dispatcher<B> {
    resolver: Arc<dyn BotResolver<B>>,
    engine: ConversationEngine<RtmMessage, B>,
    streams: CategoryStreams<B>,
    pool: WorkerPool,
    error_handler: ErrorHandler,
}

impl<B: BotIdentity> Dispatcher<B> {
    /// Must be called from within a tokio runtime (the worker pool spawns).
    pub fn new(
        resolver: Arc<dyn BotResolver<B>>,
        engine: ConversationEngine<RtmMessage, B>,
        settings: DispatchSettings,
        error_handler: ErrorHandler,
    ) -> Self {
        Self {
            resolver,
            engine,
            streams: CategoryStreams::new(settings.stream_capacity),
            pool: WorkerPool::new(settings.workers, settings.queue_depth),
            error_handler,
        }
    }

    pub fn streams(&self) -> &CategoryStreams<B> {
        &self.streams
    }

    /// Shorthand for `streams().subscribe(category)`.
    pub fn subscribe(
        &self,
        category: Category,
    ) -> Option<tokio::sync::mpsc::Receiver<Delivery<B>>> {
        self.streams.subscribe(category)
    }

    pub fn engine(&self) -> &ConversationEngine<RtmMessage, B> {
        &self.engine
    }

    /// Decode and route one frame from the multiplexer. Failures go to the
    /// error handler; nothing here stops the dispatch loop.
    pub async fn dispatch_frame(&self, frame: InboundFrame) {
        let msg = match serde_json::from_str::<RtmMessage>(&frame.payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(tenant = %frame.tenant, error = %e, "undecodable event dropped");
                (self.error_handler)(ParleyError::decode(e));
                return;
            }
        };
        if let Err(e) = self.dispatch(&frame.tenant, msg).await {
            (self.error_handler)(e);
        }
    }

    /// Route a decoded event for `tenant`.
    ///
    /// Fails only when no bot can be resolved for chat or join events or the
    /// conversation store is unreachable. A full worker queue is reported to
    /// the error handler and the event counts as routed.
    pub async fn dispatch(&self, tenant: &TenantId, msg: RtmMessage) -> Result<Routed, ParleyError> {
        if msg.kind != "message" {
            return Ok(Routed::Ignored);
        }
        let bot = self.resolver.resolve(tenant).await?;

        let category = match event_kind(&msg, bot.bot_user_id()) {
            EventKind::Ignored => return Ok(Routed::Ignored),
            EventKind::Join(category) => category,
            EventKind::Chat => {
                let key = ConversationKey::new(
                    tenant.clone(),
                    msg.user.clone(),
                    msg.channel.clone(),
                );
                if self.engine.is_active(&key).await? {
                    self.deliver(key, bot, msg);
                    return Ok(Routed::Conversation);
                }
                classify_chat(&msg, bot.bot_user_id())
            }
        };

        let published = self.streams.publish(Delivery {
            tenant: tenant.clone(),
            category,
            message: msg,
            bot,
        });
        Ok(Routed::Category(category, published))
    }

    fn deliver(&self, key: ConversationKey, bot: B, msg: RtmMessage) {
        debug!(key = %key, "routing to active conversation");
        let engine = self.engine.clone();
        let handler = Arc::clone(&self.error_handler);
        let job = async move {
            if let Err(e) = engine.deliver(key, bot, msg).await {
                handler(e);
            }
        }
        .boxed();
        if let Err(e) = self.pool.submit(job) {
            (self.error_handler)(e);
        }
    }
}

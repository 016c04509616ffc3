// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The chat-platform controller: owns the connections of every installed
//! bot and routes what they receive.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_core::{
    BotRecord, BotStore, Category, ConversationStore, ErrorHandler, ParleyError, PlatformApi,
    RtmMessage, TenantId, default_error_handler,
};
use parley_dispatch::{BotResolver, DispatchSettings, Dispatcher, Delivery};
use parley_gateway::EventSink;
use parley_mux::ConnectionMultiplexer;

use crate::bot::{ChatBot, ChatEngine, ChatRegistry};

/// Buffered bot-added notifications before new ones are dropped.
const BOT_ADDED_BUFFER: usize = 32;

/// Everything a [`ChatController`] is built from.
pub struct ChatOptions {
    pub bot_store: Arc<dyn BotStore>,
    pub conversation_store: Arc<dyn ConversationStore>,
    pub api: Arc<dyn PlatformApi>,
    pub registry: ChatRegistry,
    pub error_handler: ErrorHandler,
    pub dispatch: DispatchSettings,
}

impl ChatOptions {
    /// Options with no conversations, logging error handler and default sizing.
    pub fn new(
        bot_store: Arc<dyn BotStore>,
        conversation_store: Arc<dyn ConversationStore>,
        api: Arc<dyn PlatformApi>,
    ) -> Self {
        Self {
            bot_store,
            conversation_store,
            api,
            registry: ChatRegistry::new(),
            error_handler: default_error_handler(),
            dispatch: DispatchSettings::default(),
        }
    }
}

/// Builds bot handles from stored records, one per tenant.
struct BotFactory {
    store: Arc<dyn BotStore>,
    api: Arc<dyn PlatformApi>,
    mux: Arc<ConnectionMultiplexer>,
    engine: ChatEngine,
    bots: DashMap<TenantId, ChatBot>,
}

impl BotFactory {
    fn build(&self, record: BotRecord) -> ChatBot {
        self.bots
            .entry(record.tenant.clone())
            .or_insert_with(|| {
                ChatBot::new(
                    record,
                    Arc::clone(&self.api),
                    Arc::clone(&self.mux),
                    self.engine.clone(),
                )
            })
            .clone()
    }
}

#[async_trait]
impl BotResolver<ChatBot> for BotFactory {
    async fn resolve(&self, tenant: &TenantId) -> Result<ChatBot, ParleyError> {
        if let Some(bot) = self.bots.get(tenant) {
            return Ok(bot.clone());
        }
        let record = self.store.get_bot(tenant).await?;
        Ok(self.build(record))
    }
}

pub struct ChatController {
    factory: Arc<BotFactory>,
    dispatcher: Dispatcher<ChatBot>,
    bot_added_tx: mpsc::Sender<ChatBot>,
    bot_added_rx: Mutex<Option<mpsc::Receiver<ChatBot>>>,
    error_handler: ErrorHandler,
}

impl ChatController {
    /// Must be called from within a tokio runtime.
    pub fn new(options: ChatOptions) -> Self {
        let ChatOptions {
            bot_store,
            conversation_store,
            api,
            registry,
            error_handler,
            dispatch,
        } = options;

        let mux = Arc::new(ConnectionMultiplexer::with_error_handler(Arc::clone(
            &error_handler,
        )));
        let engine = ChatEngine::new(Arc::new(registry), conversation_store);
        let factory = Arc::new(BotFactory {
            store: bot_store,
            api,
            mux,
            engine: engine.clone(),
            bots: DashMap::new(),
        });
        let resolver: Arc<dyn BotResolver<ChatBot>> = factory.clone();
        let dispatcher = Dispatcher::new(resolver, engine, dispatch, Arc::clone(&error_handler));
        let (bot_added_tx, bot_added_rx) = mpsc::channel(BOT_ADDED_BUFFER);

        Self {
            factory,
            dispatcher,
            bot_added_tx,
            bot_added_rx: Mutex::new(Some(bot_added_rx)),
            error_handler,
        }
    }

    /// Connect every stored bot. A bot that fails to connect is reported to
    /// the error handler and the others still start.
    pub async fn start(&self) -> Result<(), ParleyError> {
        let records = self.factory.store.all_bots().await?;
        info!(count = records.len(), "starting stored bots");
        for record in records {
            let bot = self.factory.build(record);
            if let Err(e) = bot.start().await {
                warn!(tenant = %bot.tenant(), error = %e, "stored bot failed to connect");
                (self.error_handler)(e);
            }
        }
        Ok(())
    }

    /// Store, connect and announce a new bot.
    ///
    /// Fails with `AlreadyExists` when the tenant already has one. A bot that
    /// fails to connect stays stored and is retried by the next `start()`.
    pub async fn create_bot(&self, record: BotRecord) -> Result<ChatBot, ParleyError> {
        self.factory.store.add_bot(record.clone()).await?;
        let bot = self.factory.build(record);
        bot.start().await?;
        if self.bot_added_tx.try_send(bot.clone()).is_err() {
            debug!(tenant = %bot.tenant(), "bot-added notification dropped");
        }
        Ok(bot)
    }

    /// Identify `token` with the platform and create its bot unless the
    /// tenant already has one.
    pub async fn install_token(&self, token: &str) -> Result<ChatBot, ParleyError> {
        let record = self.factory.api.identify(token).await?;
        match self.factory.store.get_bot(&record.tenant).await {
            Ok(_) => {
                debug!(tenant = %record.tenant, "token already installed");
                self.factory.resolve(&record.tenant).await
            }
            Err(e) if e.is_not_found() => self.create_bot(record).await,
            Err(e) => Err(e),
        }
    }

    /// Bots created through this controller. The stream has one consumer:
    /// later calls return `None`.
    pub fn bot_added(&self) -> Option<mpsc::Receiver<ChatBot>> {
        self.bot_added_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn subscribe(&self, category: Category) -> Option<mpsc::Receiver<Delivery<ChatBot>>> {
        self.dispatcher.subscribe(category)
    }

    /// The bot installed for `tenant`.
    pub async fn bot(&self, tenant: &TenantId) -> Result<ChatBot, ParleyError> {
        self.factory.resolve(tenant).await
    }

    pub fn mux(&self) -> &Arc<ConnectionMultiplexer> {
        &self.factory.mux
    }

    pub fn engine(&self) -> &ChatEngine {
        self.dispatcher.engine()
    }

    /// Route frames from every connection until `cancel` fires or the
    /// multiplexer is closed, then close every connection.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("chat controller running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = self.factory.mux.next_frame() => match frame {
                    Some(frame) => self.dispatcher.dispatch_frame(frame).await,
                    None => break,
                },
            }
        }
        self.factory.mux.close().await;
        info!("chat controller stopped");
    }
}

#[async_trait]
impl EventSink for ChatController {
    async fn handle_event(&self, tenant: &TenantId, event: RtmMessage) -> Result<(), ParleyError> {
        let routed = self.dispatcher.dispatch(tenant, event).await?;
        debug!(tenant = %tenant, routed = ?routed, "event callback routed");
        Ok(())
    }

    async fn has_bot(&self, tenant: &TenantId) -> Result<bool, ParleyError> {
        match self.factory.store.get_bot(tenant).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Websocket endpoint for widget clients.
//!
//! Client -> server: a JSON message, e.g. `{"type": "message", "text": "hi"}`.
//! Server -> client: stored items (`message`, `thread`, `update`) with their
//! cursors, including the echo of every client message.

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use parley_core::item::next_item_id;
use parley_core::{
    ControllerStore, ConversationStore, ErrorHandler, Item, ItemSource, Message, ParleyError,
    TenantId, default_error_handler,
};

use crate::bot::{BotParts, WebBot, WebEngine, WebRegistry};
use crate::sanitize::sanitize;

/// Picks the bot id for a connecting client from its upgrade request headers.
pub type BotIdCreator = Arc<dyn Fn(&HeaderMap) -> Result<TenantId, ParleyError> + Send + Sync>;

/// A random `u64` per connection.
pub fn random_bot_id() -> BotIdCreator {
    Arc::new(|_| Ok(TenantId::new(rand::random::<u64>().to_string())))
}

/// A client message together with the bot that should answer it.
#[derive(Debug, Clone)]
pub struct WebMessage {
    pub bot: WebBot,
    pub message: Message,
}

pub struct WebOptions {
    pub controller_store: Arc<dyn ControllerStore>,
    pub conversation_store: Arc<dyn ConversationStore>,
    pub registry: WebRegistry,
    pub id_creator: BotIdCreator,
    pub error_handler: ErrorHandler,
    /// Items queued per connection before `say` waits.
    pub outgoing_buffer: usize,
    /// Buffered notifications and messages before new ones are dropped.
    pub stream_capacity: usize,
}

impl WebOptions {
    pub fn new(
        controller_store: Arc<dyn ControllerStore>,
        conversation_store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            controller_store,
            conversation_store,
            registry: WebRegistry::new(),
            id_creator: random_bot_id(),
            error_handler: default_error_handler(),
            outgoing_buffer: 64,
            stream_capacity: 256,
        }
    }
}

struct Inner {
    store: Arc<dyn ControllerStore>,
    engine: WebEngine,
    id_creator: BotIdCreator,
    error_handler: ErrorHandler,
    outgoing_buffer: usize,
    bot_added_tx: mpsc::Sender<WebBot>,
    bot_added_rx: Mutex<Option<mpsc::Receiver<WebBot>>>,
    messages_tx: mpsc::Sender<WebMessage>,
    messages_rx: Mutex<Option<mpsc::Receiver<WebMessage>>>,
}

/// Accepts widget connections and turns each into a [`WebBot`].
#[derive(Clone)]
pub struct WebController {
    inner: Arc<Inner>,
}

impl WebController {
    pub fn new(options: WebOptions) -> Self {
        let capacity = options.stream_capacity.max(1);
        let (bot_added_tx, bot_added_rx) = mpsc::channel(capacity);
        let (messages_tx, messages_rx) = mpsc::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                store: options.controller_store,
                engine: WebEngine::new(Arc::new(options.registry), options.conversation_store),
                id_creator: options.id_creator,
                error_handler: options.error_handler,
                outgoing_buffer: options.outgoing_buffer.max(1),
                bot_added_tx,
                bot_added_rx: Mutex::new(Some(bot_added_rx)),
                messages_tx,
                messages_rx: Mutex::new(Some(messages_rx)),
            }),
        }
    }

    /// Mount the websocket endpoint at `path`.
    pub fn router(&self, path: &str) -> Router {
        Router::new()
            .route(path, get(connect))
            .with_state(self.clone())
    }

    /// Bots of newly connected clients. Taken once.
    pub fn bot_added(&self) -> Option<mpsc::Receiver<WebBot>> {
        take(&self.inner.bot_added_rx)
    }

    /// Client messages not claimed by a conversation. Taken once.
    pub fn messages(&self) -> Option<mpsc::Receiver<WebMessage>> {
        take(&self.inner.messages_rx)
    }

    pub fn engine(&self) -> &WebEngine {
        &self.inner.engine
    }

    async fn register(&self, id: &TenantId) -> Result<(WebBot, mpsc::Receiver<Item>), ParleyError> {
        self.inner.store.add(id).await?;
        let items = self.inner.store.get(id).await?;
        let (outgoing, rx) = mpsc::channel(self.inner.outgoing_buffer);
        let bot = WebBot::new(BotParts {
            id: id.clone(),
            items,
            outgoing,
            engine: self.inner.engine.clone(),
            controllers: Arc::clone(&self.inner.store),
            error_handler: Arc::clone(&self.inner.error_handler),
        });
        Ok((bot, rx))
    }

    /// Runs for the lifetime of one upgraded connection: the reader here,
    /// the writer in its own task.
    async fn serve(self, id: TenantId, socket: WebSocket) {
        let (bot, outgoing) = match self.register(&id).await {
            Ok(registered) => registered,
            Err(e) => {
                warn!(bot = %id, error = %e, "widget client could not be registered");
                (self.inner.error_handler)(e);
                return;
            }
        };
        info!(bot = %id, "widget client connected");

        let (sink, stream) = socket.split();
        let writer = tokio::spawn(write_loop(bot.clone(), sink, outgoing));
        if let Err(TrySendError::Full(_)) = self.inner.bot_added_tx.try_send(bot.clone()) {
            warn!(bot = %id, "bot-added stream full, notification dropped");
        }

        self.read_loop(&bot, stream).await;
        bot.disconnect().await;
        if let Err(e) = writer.await {
            warn!(bot = %id, error = %e, "widget writer ended abnormally");
        }
    }

    async fn read_loop(&self, bot: &WebBot, mut stream: SplitStream<WebSocket>) {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => self.handle_inbound(bot, text.as_str().as_bytes()).await,
                Ok(WsMessage::Binary(bytes)) => self.handle_inbound(bot, &bytes).await,
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    bot.report(ParleyError::transport(bot.id().as_str(), e));
                    break;
                }
            }
        }
    }

    /// Decode, stamp, sanitize and echo a client message, then hand it to
    /// the active conversation or the messages stream.
    async fn handle_inbound(&self, bot: &WebBot, raw: &[u8]) {
        let mut msg: Message = match serde_json::from_slice(raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(bot = %bot.id(), error = %e, "undecodable client message dropped");
                bot.report(ParleyError::decode(e));
                return;
            }
        };
        msg.id = next_item_id();
        msg.text = sanitize(&msg.text);
        msg.source = Some(ItemSource::User);
        msg.prev = None;
        msg.next = None;

        if let Err(e) = bot.push(Item::Message(msg.clone())).await {
            bot.report(e);
        }

        let key = bot.conversation_key();
        match bot.engine().is_active(&key).await {
            Ok(true) => {
                if let Err(e) = bot.engine().deliver(key, bot.clone(), msg).await {
                    bot.report(e);
                }
            }
            Ok(false) => {
                let pair = WebMessage {
                    bot: bot.clone(),
                    message: msg,
                };
                match self.inner.messages_tx.try_send(pair) {
                    Ok(()) => debug!(bot = %bot.id(), "client message published"),
                    Err(TrySendError::Full(_)) => {
                        warn!(bot = %bot.id(), "messages stream full, dropping client message");
                    }
                    Err(TrySendError::Closed(_)) => {}
                }
            }
            Err(e) => bot.report(e),
        }
    }
}

async fn write_loop(
    bot: WebBot,
    mut sink: SplitSink<WebSocket, WsMessage>,
    mut outgoing: mpsc::Receiver<Item>,
) {
    loop {
        let item = tokio::select! {
            _ = bot.closed() => break,
            item = outgoing.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };
        let text = match serde_json::to_string(&item) {
            Ok(text) => text,
            Err(e) => {
                bot.report(ParleyError::decode(e));
                continue;
            }
        };
        if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
            bot.report(ParleyError::transport(bot.id().as_str(), e));
            break;
        }
    }
    bot.disconnect().await;
    let _ = sink.close().await;
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// GET {path}
async fn connect(
    State(controller): State<WebController>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let id = match (controller.inner.id_creator)(&headers) {
        Ok(id) => id,
        Err(e) => {
            (controller.inner.error_handler)(e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    ws.on_upgrade(move |socket| controller.serve(id, socket))
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One widget client connection and the items it exchanges.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use parley_conversation::{Controls, Conversation, ConversationEngine, ConversationRegistry};
use parley_core::{
    ControllerStore, ConversationKey, ErrorHandler, Item, ItemId, ItemSource, ItemStore, Message,
    ParleyError, TenantId, Thread,
};
use parley_core::item::next_item_id;

pub type WebConversation = Conversation<Message, WebBot>;
pub type WebRegistry = ConversationRegistry<Message, WebBot>;
pub type WebControls = Controls<WebBot>;
pub type WebEngine = ConversationEngine<Message, WebBot>;

/// A widget session has a single user in a single room.
const WIDGET_USER: &str = "client";
const WIDGET_ROOM: &str = "widget";

pub(crate) struct BotParts {
    pub id: TenantId,
    pub items: Arc<dyn ItemStore>,
    pub outgoing: mpsc::Sender<Item>,
    pub engine: WebEngine,
    pub controllers: Arc<dyn ControllerStore>,
    pub error_handler: ErrorHandler,
}

struct Inner {
    id: TenantId,
    items: Arc<dyn ItemStore>,
    outgoing: mpsc::Sender<Item>,
    engine: WebEngine,
    controllers: Arc<dyn ControllerStore>,
    error_handler: ErrorHandler,
    closed: CancellationToken,
    removed: AtomicBool,
}

/// The bot side of one widget connection. Cheap to clone.
#[derive(Clone)]
pub struct WebBot {
    inner: Arc<Inner>,
}

impl fmt::Debug for WebBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebBot")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

impl WebBot {
    pub(crate) fn new(parts: BotParts) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: parts.id,
                items: parts.items,
                outgoing: parts.outgoing,
                engine: parts.engine,
                controllers: parts.controllers,
                error_handler: parts.error_handler,
                closed: CancellationToken::new(),
                removed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &TenantId {
        &self.inner.id
    }

    pub fn is_connected(&self) -> bool {
        !self.inner.closed.is_cancelled()
    }

    /// Key of this connection's conversation.
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(self.inner.id.clone(), WIDGET_USER, WIDGET_ROOM)
    }

    /// Send a new bot message. Returns the item as stored.
    pub async fn say(&self, msg: Message) -> Result<Item, ParleyError> {
        self.push(Item::Message(outgoing(msg))).await
    }

    /// Answer `original`, staying in its thread.
    pub async fn reply(&self, original: &Message, msg: Message) -> Result<Item, ParleyError> {
        let mut msg = outgoing(msg);
        msg.reply_id = original.id;
        if !original.thread_id.is_root() {
            msg.thread_id = original.thread_id;
        }
        self.push(Item::Message(msg)).await
    }

    /// Answer `original` in a thread. Outside a thread this opens one rooted
    /// at `original` first: the marker takes the original's place in its list
    /// and is stored before the reply.
    pub async fn reply_in_thread(
        &self,
        original: &Message,
        msg: Message,
    ) -> Result<Item, ParleyError> {
        if !original.thread_id.is_root() {
            return self.reply(original, msg).await;
        }

        let mut msg = outgoing(msg);
        msg.reply_id = original.id;
        msg.thread_id = original.id;

        let marker = Thread::from_message(original);
        let stored = match self.inner.items.add(Item::Thread(marker.clone())).await {
            Ok(stored) => stored,
            // Opened by an earlier reply.
            Err(ParleyError::AlreadyExists { .. }) => {
                self.inner.items.get(marker.id, marker.thread_id).await?
            }
            Err(e) => return Err(e),
        };
        self.deliver(stored).await?;
        self.push(Item::Message(msg)).await
    }

    /// Replace the content of a message the client already has.
    pub async fn update(&self, mut msg: Message) -> Result<Item, ParleyError> {
        msg.source = Some(ItemSource::Bot);
        msg.prev = None;
        msg.next = None;
        self.push(Item::Update(msg)).await
    }

    /// Resend an item as-is, without storing it (history, cached items).
    ///
    /// The id must be set, and messages must carry their source.
    pub async fn send(&self, item: Item) -> Result<(), ParleyError> {
        if item.id().is_root() {
            return Err(ParleyError::InvalidInput("item id not set".into()));
        }
        if let Some(msg) = item.as_message() {
            if msg.source.is_none() {
                return Err(ParleyError::InvalidInput("item source not set".into()));
            }
        }
        self.deliver(item).await
    }

    /// The last `n` items of `thread`, oldest first.
    pub async fn history(&self, n: usize, thread: ItemId) -> Result<Vec<Item>, ParleyError> {
        self.inner.items.last(n, thread).await
    }

    pub async fn start_conversation(&self, name: &str) -> Result<(), ParleyError> {
        self.inner
            .engine
            .start(self.conversation_key(), name, self.clone())
            .await
    }

    /// Store then send. Updates overwrite the stored message.
    pub(crate) async fn push(&self, item: Item) -> Result<Item, ParleyError> {
        if matches!(item, Item::Update(_)) {
            self.inner.items.update(item.clone()).await?;
            self.deliver(item.clone()).await?;
            return Ok(item);
        }
        let stored = self.inner.items.add(item).await?;
        self.deliver(stored.clone()).await?;
        Ok(stored)
    }

    async fn deliver(&self, item: Item) -> Result<(), ParleyError> {
        if self.inner.closed.is_cancelled() {
            return Err(self.closed_error());
        }
        self.inner
            .outgoing
            .send(item)
            .await
            .map_err(|_| self.closed_error())
    }

    fn closed_error(&self) -> ParleyError {
        ParleyError::transport(
            self.inner.id.as_str(),
            std::io::Error::other("widget connection closed"),
        )
    }

    pub(crate) fn report(&self, err: ParleyError) {
        (self.inner.error_handler)(err);
    }

    pub(crate) fn engine(&self) -> &WebEngine {
        &self.inner.engine
    }

    pub(crate) async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }

    /// Unregister from the controller store. Runs once however many of the
    /// connection's tasks end.
    pub(crate) async fn disconnect(&self) {
        self.inner.closed.cancel();
        if self.inner.removed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.inner.controllers.remove(&self.inner.id).await {
            Ok(()) => info!(bot = %self.inner.id, "widget client disconnected"),
            Err(e) => self.report(e),
        }
    }
}

fn outgoing(mut msg: Message) -> Message {
    msg.source = Some(ItemSource::Bot);
    msg.id = next_item_id();
    msg.prev = None;
    msg.next = None;
    msg
}

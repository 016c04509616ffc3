// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-tenant bot handle given to consumers and conversation handlers.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use parley_conversation::{Controls, Conversation, ConversationEngine, ConversationRegistry};
use parley_core::{
    BotRecord, ChatMessage, ConversationKey, ParleyError, PlatformApi, RoomId, RtmMessage,
    TenantId, UserId,
};
use parley_dispatch::BotIdentity;
use parley_mux::ConnectionMultiplexer;

/// Conversation definitions run by chat bots.
pub type ChatConversation = Conversation<RtmMessage, ChatBot>;
pub type ChatRegistry = ConversationRegistry<RtmMessage, ChatBot>;
pub type ChatControls = Controls<ChatBot>;
pub type ChatEngine = ConversationEngine<RtmMessage, ChatBot>;

struct Inner {
    record: BotRecord,
    api: Arc<dyn PlatformApi>,
    mux: Arc<ConnectionMultiplexer>,
    engine: ChatEngine,
}

/// A bot installed in one tenant. Cheap to clone.
#[derive(Clone)]
pub struct ChatBot {
    inner: Arc<Inner>,
}

impl fmt::Debug for ChatBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatBot")
            .field("tenant", &self.inner.record.tenant)
            .field("bot_user_id", &self.inner.record.bot_user_id)
            .finish_non_exhaustive()
    }
}

impl ChatBot {
    pub fn new(
        record: BotRecord,
        api: Arc<dyn PlatformApi>,
        mux: Arc<ConnectionMultiplexer>,
        engine: ChatEngine,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                record,
                api,
                mux,
                engine,
            }),
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.inner.record.tenant
    }

    pub fn token(&self) -> &str {
        &self.inner.record.token
    }

    pub fn record(&self) -> &BotRecord {
        &self.inner.record
    }

    /// Ask the platform for a real-time endpoint and connect to it.
    pub async fn start(&self) -> Result<(), ParleyError> {
        let endpoint = self.inner.api.connect_url(self.token()).await?;
        self.inner.mux.open(self.tenant().clone(), &endpoint).await?;
        info!(tenant = %self.tenant(), "bot connected");
        Ok(())
    }

    /// Post `msg` to `room`. An empty room is rejected before any call.
    pub async fn say(&self, room: &str, mut msg: ChatMessage) -> Result<ChatMessage, ParleyError> {
        if room.is_empty() {
            return Err(ParleyError::InvalidInput("say needs a room".into()));
        }
        msg.channel = room.to_string();
        debug!(tenant = %self.tenant(), room, "posting message");
        self.inner.api.post_message(self.token(), &msg).await
    }

    /// Answer `original` in its room, staying in its thread when it has one.
    pub async fn reply(
        &self,
        original: &RtmMessage,
        mut msg: ChatMessage,
    ) -> Result<ChatMessage, ParleyError> {
        if original.thread_ts.is_some() {
            msg.thread_ts = original.thread_ts.clone();
        }
        self.say(&original.channel, msg).await
    }

    /// Answer `original` in a thread, starting one under it when needed.
    pub async fn reply_in_thread(
        &self,
        original: &RtmMessage,
        mut msg: ChatMessage,
    ) -> Result<ChatMessage, ParleyError> {
        let parent = original
            .thread_ts
            .clone()
            .unwrap_or_else(|| original.ts.clone());
        if parent.is_empty() {
            return Err(ParleyError::InvalidInput(
                "cannot thread a reply to a message without ts".into(),
            ));
        }
        msg.thread_ts = Some(parent);
        self.say(&original.channel, msg).await
    }

    /// Edit a previously posted message; `msg.channel` and `msg.ts` name it.
    pub async fn update(&self, msg: ChatMessage) -> Result<ChatMessage, ParleyError> {
        self.inner.api.update_message(self.token(), &msg).await
    }

    /// Show the typing indicator in `room` over the real-time connection.
    pub async fn typing(&self, room: &str) -> Result<(), ParleyError> {
        self.inner.mux.typing(self.tenant(), room).await
    }

    /// Start conversation `name` with `user` in `room`.
    pub async fn start_conversation(
        &self,
        user: impl Into<UserId>,
        room: impl Into<RoomId>,
        name: &str,
    ) -> Result<(), ParleyError> {
        let key = ConversationKey::new(self.tenant().clone(), user, room);
        self.inner.engine.start(key, name, self.clone()).await
    }
}

impl BotIdentity for ChatBot {
    fn bot_user_id(&self) -> &UserId {
        &self.inner.record.bot_user_id
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve`: wires both bot variants behind one HTTP listener.
//!
//! Routes: the chat gateway (`/health`, `/slack/*`) and the widget
//! websocket at `web.path`. Chat bots are restored from the bot store and
//! from `chat.bot_tokens`; both variants answer unclaimed direct messages
//! with an echo until the process is told to stop.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use parley_chat::{ChatController, ChatOptions, HttpPlatformApi, MemoryBotStore, RedisBotStore};
use parley_config::ParleyConfig;
use parley_config::model::{StorageBackend, StorageConfig};
use parley_conversation::{MemoryConversationStore, RedisConversationStore};
use parley_core::{
    BotStore, Category, ChatMessage, ControllerStore, ConversationStore, Message, ParleyError,
};
use parley_dispatch::{Delivery, DispatchSettings};
use parley_gateway::{EventSink, GatewaySettings, GatewayStreams, gateway};
use parley_items::{MemoryControllerStore, RedisControllerStore};
use parley_web::{WebController, WebMessage, WebOptions};

use crate::shutdown;

/// Runs the server until SIGINT or SIGTERM.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.server.log_level);
    info!(
        backend = ?config.storage.backend,
        "starting parley serve"
    );

    let stores = open_stores(&config.storage).await?;
    let api = Arc::new(HttpPlatformApi::new(config.chat.api_base_url.clone())?);

    let mut chat_options = ChatOptions::new(stores.bots, stores.chat_conversations, api);
    chat_options.dispatch = DispatchSettings {
        stream_capacity: config.dispatch.stream_capacity,
        workers: config.dispatch.workers,
        queue_depth: config.dispatch.queue_depth,
    };
    let chat = Arc::new(ChatController::new(chat_options));

    let mut web_options = WebOptions::new(stores.controllers, stores.web_conversations);
    web_options.outgoing_buffer = config.web.outgoing_buffer;
    web_options.stream_capacity = config.dispatch.stream_capacity;
    let web = WebController::new(web_options);

    let settings = GatewaySettings {
        verification_token: config.chat.verification_token.clone(),
        immediate_response_timeout: Duration::from_millis(
            config.chat.immediate_response_timeout_ms,
        ),
        response_quota: config.chat.response_quota,
        stream_capacity: config.dispatch.stream_capacity,
    };
    let sink: Arc<dyn EventSink> = chat.clone();
    let (gateway_routes, streams) = gateway(settings, sink, reqwest::Client::new());

    let app = Router::new()
        .merge(gateway_routes)
        .merge(web.router(&config.web.path))
        .layer(CorsLayer::permissive());

    spawn_consumers(&chat, &web, streams);

    for token in &config.chat.bot_tokens {
        match chat.install_token(token).await {
            Ok(bot) => info!(tenant = %bot.tenant(), "configured bot token installed"),
            Err(e) => warn!(error = %e, "configured bot token could not be installed"),
        }
    }
    chat.start().await?;

    let cancel = shutdown::install_signal_handler();
    let runner = {
        let chat = Arc::clone(&chat);
        let cancel = cancel.clone();
        tokio::spawn(async move { chat.run(cancel).await })
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Config(format!("failed to bind {addr}: {e}")))?;
    info!(addr = %addr, widget_path = %config.web.path, "parley listening");

    let serve_cancel = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_cancel.cancelled().await })
        .await;

    // The listener can also fail on its own; stop the chat side either way.
    cancel.cancel();
    if let Err(e) = runner.await {
        warn!(error = %e, "chat controller task ended abnormally");
    }
    served.map_err(|e| ParleyError::Internal(format!("http server error: {e}")))?;

    info!("parley serve shutdown complete");
    Ok(())
}

struct Stores {
    bots: Arc<dyn BotStore>,
    chat_conversations: Arc<dyn ConversationStore>,
    controllers: Arc<dyn ControllerStore>,
    web_conversations: Arc<dyn ConversationStore>,
}

/// Chat and widget state live under separate namespaces so their
/// conversation keys never collide.
async fn open_stores(storage: &StorageConfig) -> Result<Stores, ParleyError> {
    match storage.backend {
        StorageBackend::Memory => Ok(Stores {
            bots: Arc::new(MemoryBotStore::new()),
            chat_conversations: Arc::new(MemoryConversationStore::new()),
            controllers: Arc::new(MemoryControllerStore::new()),
            web_conversations: Arc::new(MemoryConversationStore::new()),
        }),
        StorageBackend::Redis => {
            let url = storage.redis_url.as_deref().ok_or_else(|| {
                ParleyError::Config("storage.redis_url is required for redis".into())
            })?;
            let ns = storage.namespace.as_str();
            Ok(Stores {
                bots: Arc::new(RedisBotStore::connect(url, ns).await?),
                chat_conversations: Arc::new(
                    RedisConversationStore::connect(url, format!("{ns}:chat")).await?,
                ),
                controllers: Arc::new(RedisControllerStore::connect(url, format!("{ns}:web")).await?),
                web_conversations: Arc::new(
                    RedisConversationStore::connect(url, format!("{ns}:web")).await?,
                ),
            })
        }
    }
}

/// Default behaviour for traffic no conversation claimed.
fn spawn_consumers(chat: &ChatController, web: &WebController, streams: GatewayStreams) {
    if let Some(direct) = chat.subscribe(Category::Direct) {
        tokio::spawn(echo_direct(direct));
    }
    if let Some(messages) = web.messages() {
        tokio::spawn(echo_widget(messages));
    }
    tokio::spawn(acknowledge_commands(streams.commands));
    tokio::spawn(acknowledge_interactions(streams.interactions));
}

async fn echo_direct(mut deliveries: mpsc::Receiver<Delivery<parley_chat::ChatBot>>) {
    while let Some(delivery) = deliveries.recv().await {
        let reply = ChatMessage::text(delivery.message.text.clone());
        if let Err(e) = delivery.bot.reply(&delivery.message, reply).await {
            warn!(tenant = %delivery.tenant, error = %e, "direct message echo failed");
        }
    }
}

async fn echo_widget(mut messages: mpsc::Receiver<WebMessage>) {
    while let Some(WebMessage { bot, message }) = messages.recv().await {
        let reply = Message::text(message.text.clone());
        if let Err(e) = bot.reply(&message, reply).await {
            debug!(bot = %bot.id(), error = %e, "widget echo failed");
        }
    }
}

async fn acknowledge_commands(mut commands: mpsc::Receiver<parley_gateway::Command>) {
    while let Some(command) = commands.recv().await {
        let data = command.data();
        let msg = ChatMessage::text(format!("{} {}", data.command, data.text).trim_end());
        if let Err(e) = command.respond_immediately(&msg, false) {
            debug!(tenant = %command.tenant(), error = %e, "command acknowledgement dropped");
        }
    }
}

async fn acknowledge_interactions(mut interactions: mpsc::Receiver<parley_gateway::Interaction>) {
    while let Some(interaction) = interactions.recv().await {
        if let Err(e) = interaction.respond_with_empty_body() {
            debug!(tenant = %interaction.tenant(), error = %e, "interaction acknowledgement dropped");
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "parley={log_level},parley_chat={log_level},parley_web={log_level},\
             parley_gateway={log_level},parley_mux={log_level},\
             parley_dispatch={log_level},warn"
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn cancelled() -> CancellationToken {
        let token = CancellationToken::new();
        token.cancel();
        token
    }

    #[tokio::test]
    async fn memory_stores_are_independent() {
        let stores = open_stores(&StorageConfig::default()).await.unwrap();
        let key = parley_core::ConversationKey::new("T1", "U1", "C1");
        stores
            .chat_conversations
            .start(&key, "greeting")
            .await
            .unwrap();
        assert!(stores.chat_conversations.is_active(&key).await.unwrap());
        assert!(!stores.web_conversations.is_active(&key).await.unwrap());
    }

    #[tokio::test]
    async fn redis_backend_without_url_is_a_config_error() {
        let storage = StorageConfig {
            backend: StorageBackend::Redis,
            ..StorageConfig::default()
        };
        let err = open_stores(&storage).await.err().unwrap();
        assert!(matches!(err, ParleyError::Config(_)));
    }

    #[tokio::test]
    async fn chat_runner_stops_on_cancel() {
        let stores = open_stores(&StorageConfig::default()).await.unwrap();
        let api = Arc::new(HttpPlatformApi::new("http://127.0.0.1:1").unwrap());
        let chat = ChatController::new(ChatOptions::new(
            stores.bots,
            stores.chat_conversations,
            api,
        ));
        tokio::time::timeout(Duration::from_secs(5), chat.run(cancelled()))
            .await
            .unwrap();
    }
}

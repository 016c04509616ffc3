// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatcher routing: category streams, active conversations, failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use parley_conversation::{
    Controls, Conversation, ConversationEngine, ConversationRegistry, MemoryConversationStore,
};
use parley_core::{
    Category, ConversationKey, ErrorHandler, InboundFrame, ParleyError, RtmMessage, TenantId,
    UserId,
};
use parley_dispatch::{
    BotIdentity, BotResolver, DispatchSettings, Dispatcher, Routed, classify_chat,
};

#[derive(Clone)]
struct TestBot {
    user: UserId,
    heard: Arc<Mutex<Vec<String>>>,
}

impl BotIdentity for TestBot {
    fn bot_user_id(&self) -> &UserId {
        &self.user
    }
}

struct Bots(HashMap<TenantId, TestBot>);

#[async_trait]
impl BotResolver<TestBot> for Bots {
    async fn resolve(&self, tenant: &TenantId) -> Result<TestBot, ParleyError> {
        self.0
            .get(tenant)
            .cloned()
            .ok_or_else(|| ParleyError::not_found("bot", tenant.as_str()))
    }
}

fn echo_conversation() -> Conversation<RtmMessage, TestBot> {
    Conversation::new()
        .on("start", |_msg: RtmMessage, ctl: Controls<TestBot>| async move {
            ctl.to("listen").await
        })
        .transitions("start", ["listen"])
        .on("listen", |msg: RtmMessage, ctl: Controls<TestBot>| async move {
            ctl.bot().heard.lock().unwrap().push(msg.text.clone());
            ctl.end().await
        })
}

struct Harness {
    dispatcher: Dispatcher<TestBot>,
    bot: TestBot,
    errors: Arc<Mutex<Vec<String>>>,
}

fn harness() -> Harness {
    let bot = TestBot {
        user: UserId::new("UBOT"),
        heard: Arc::new(Mutex::new(Vec::new())),
    };
    let mut bots = HashMap::new();
    bots.insert(TenantId::new("T1"), bot.clone());

    let mut registry = ConversationRegistry::new();
    registry.add("echo", echo_conversation()).unwrap();
    let engine = ConversationEngine::new(
        Arc::new(registry),
        Arc::new(MemoryConversationStore::new()),
    );

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let handler: ErrorHandler = Arc::new(move |e| sink.lock().unwrap().push(e.to_string()));

    let settings = DispatchSettings {
        stream_capacity: 8,
        workers: 2,
        queue_depth: 8,
    };
    Harness {
        dispatcher: Dispatcher::new(Arc::new(Bots(bots)), engine, settings, handler),
        bot,
        errors,
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn chat_events_reach_their_category_stream() {
    let h = harness();
    let tenant = TenantId::new("T1");
    let mut direct = h.dispatcher.subscribe(Category::Direct).unwrap();
    let mut mention = h.dispatcher.subscribe(Category::DirectMention).unwrap();
    let mut own = h.dispatcher.subscribe(Category::SelfMessage).unwrap();

    let routed = h
        .dispatcher
        .dispatch(&tenant, RtmMessage::message("D1", "U1", "hello"))
        .await
        .unwrap();
    assert_eq!(routed, Routed::Category(Category::Direct, true));

    h.dispatcher
        .dispatch(&tenant, RtmMessage::message("C1", "U1", "<@UBOT> status"))
        .await
        .unwrap();
    h.dispatcher
        .dispatch(&tenant, RtmMessage::message("D1", "UBOT", "hello"))
        .await
        .unwrap();

    let d = direct.recv().await.unwrap();
    assert_eq!(d.tenant, tenant);
    assert_eq!(d.message.text, "hello");
    assert_eq!(d.bot.user, UserId::new("UBOT"));
    assert_eq!(mention.recv().await.unwrap().message.text, "<@UBOT> status");
    assert_eq!(own.recv().await.unwrap().message.user, "UBOT");
    assert!(direct.try_recv().is_err());
}

#[tokio::test]
async fn join_events_are_published_by_subtype() {
    let h = harness();
    let mut joins = h.dispatcher.subscribe(Category::UserRoomJoin).unwrap();
    let msg = RtmMessage {
        subtype: Some("channel_join".into()),
        ..RtmMessage::message("C1", "U7", "<@U7> has joined the channel")
    };
    let routed = h
        .dispatcher
        .dispatch(&TenantId::new("T1"), msg)
        .await
        .unwrap();
    assert_eq!(routed, Routed::Category(Category::UserRoomJoin, true));
    assert_eq!(joins.recv().await.unwrap().message.user, "U7");
}

#[tokio::test]
async fn active_conversation_claims_the_event() {
    let h = harness();
    let tenant = TenantId::new("T1");
    let mut direct = h.dispatcher.subscribe(Category::Direct).unwrap();
    let key = ConversationKey::new("T1", "U1", "D1");

    h.dispatcher
        .engine()
        .start(key.clone(), "echo", h.bot.clone())
        .await
        .unwrap();

    let routed = h
        .dispatcher
        .dispatch(&tenant, RtmMessage::message("D1", "U1", "ping"))
        .await
        .unwrap();
    assert_eq!(routed, Routed::Conversation);

    let heard = Arc::clone(&h.bot.heard);
    eventually(|| heard.lock().unwrap().len() == 1).await;
    assert_eq!(heard.lock().unwrap()[0], "ping");
    assert!(direct.try_recv().is_err());

    // The conversation ended, so the next message is classified again.
    for _ in 0..200 {
        if !h.dispatcher.engine().is_active(&key).await.unwrap() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let routed = h
        .dispatcher
        .dispatch(&tenant, RtmMessage::message("D1", "U1", "again"))
        .await
        .unwrap();
    assert_eq!(routed, Routed::Category(Category::Direct, true));
}

#[tokio::test]
async fn conversation_in_another_room_does_not_claim() {
    let h = harness();
    h.dispatcher
        .engine()
        .start(ConversationKey::new("T1", "U1", "D1"), "echo", h.bot.clone())
        .await
        .unwrap();
    let routed = h
        .dispatcher
        .dispatch(&TenantId::new("T1"), RtmMessage::message("C5", "U1", "hi"))
        .await
        .unwrap();
    assert_eq!(routed, Routed::Category(Category::Ambient, true));
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let h = harness();
    let err = h
        .dispatcher
        .dispatch(&TenantId::new("T404"), RtmMessage::message("D1", "U1", "hi"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // Non-message frames never need a bot.
    let hello = RtmMessage {
        kind: "hello".into(),
        ..RtmMessage::default()
    };
    assert_eq!(
        h.dispatcher
            .dispatch(&TenantId::new("T404"), hello)
            .await
            .unwrap(),
        Routed::Ignored
    );
}

#[tokio::test]
async fn frame_failures_go_to_the_error_handler() {
    let h = harness();
    h.dispatcher
        .dispatch_frame(InboundFrame {
            tenant: TenantId::new("T1"),
            payload: "[1,2,3]".into(),
        })
        .await;
    h.dispatcher
        .dispatch_frame(InboundFrame {
            tenant: TenantId::new("T404"),
            payload: r#"{"type":"message","channel":"D1","user":"U1","text":"x"}"#.into(),
        })
        .await;

    let errors = h.errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("decode error"));
    assert!(errors[1].contains("bot not found"));
}

proptest! {
    #[test]
    fn identical_direct_text_splits_on_sender(text in ".{0,40}", room in "D[A-Z0-9]{1,8}") {
        let bot = UserId::new("UBOT");
        let own = RtmMessage::message(&room, "UBOT", &text);
        let other = RtmMessage::message(&room, "U1", &text);
        prop_assert_eq!(classify_chat(&own, &bot), Category::SelfMessage);
        prop_assert_eq!(classify_chat(&other, &bot), Category::Direct);
        prop_assert_eq!(classify_chat(&other, &bot), classify_chat(&other, &bot));
    }
}

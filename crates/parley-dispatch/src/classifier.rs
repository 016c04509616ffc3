// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure classification of inbound chat events.
//!
//! Classification never fails: every decoded event is either ignored, a
//! join of some kind, or chat content that lands in exactly one category.

use parley_core::{Category, RtmMessage, UserId};

/// What an event is before the active-conversation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Chat content, classified with [`classify_chat`] unless a
    /// conversation claims it first.
    Chat,
    /// A membership change with its join category.
    Join(Category),
    /// Not routed anywhere (non-message frames, edits, deletions, ...).
    Ignored,
}

/// Sort an event into chat content, a join, or nothing.
pub fn event_kind(msg: &RtmMessage, bot_user: &UserId) -> EventKind {
    if msg.kind != "message" {
        return EventKind::Ignored;
    }
    match msg.subtype.as_deref() {
        None | Some("") => EventKind::Chat,
        Some("channel_join") if msg.user == bot_user.as_str() => {
            EventKind::Join(Category::RoomJoin)
        }
        Some("channel_join") => EventKind::Join(Category::UserRoomJoin),
        Some("group_join") => EventKind::Join(Category::GroupJoin),
        Some(_) => EventKind::Ignored,
    }
}

/// Category of a chat message; the first matching rule wins.
pub fn classify_chat(msg: &RtmMessage, bot_user: &UserId) -> Category {
    let known_bot = !bot_user.as_str().is_empty();
    let mention = format!("<@{bot_user}");

    if known_bot && msg.user == bot_user.as_str() {
        Category::SelfMessage
    } else if msg.channel.starts_with('D') {
        Category::Direct
    } else if known_bot && msg.text.starts_with(&mention) {
        Category::DirectMention
    } else if known_bot && msg.text.contains(&mention) {
        Category::Mention
    } else {
        Category::Ambient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> UserId {
        UserId::new("UBOT")
    }

    fn join(subtype: &str, user: &str) -> RtmMessage {
        RtmMessage {
            subtype: Some(subtype.into()),
            ..RtmMessage::message("C1", user, "")
        }
    }

    #[test]
    fn own_message_is_self_even_in_direct_room() {
        let msg = RtmMessage::message("D1", "UBOT", "hi");
        assert_eq!(classify_chat(&msg, &bot()), Category::SelfMessage);

        let other = RtmMessage::message("D1", "U1", "hi");
        assert_eq!(classify_chat(&other, &bot()), Category::Direct);
    }

    #[test]
    fn mentions() {
        let direct = RtmMessage::message("C1", "U1", "<@UBOT> deploy");
        assert_eq!(classify_chat(&direct, &bot()), Category::DirectMention);

        let inline = RtmMessage::message("C1", "U1", "ask <@UBOT|parley> later");
        assert_eq!(classify_chat(&inline, &bot()), Category::Mention);

        let someone_else = RtmMessage::message("C1", "U1", "<@U2> hi");
        assert_eq!(classify_chat(&someone_else, &bot()), Category::Ambient);
    }

    #[test]
    fn direct_room_wins_over_mention() {
        let msg = RtmMessage::message("D9", "U1", "<@UBOT> hi");
        assert_eq!(classify_chat(&msg, &bot()), Category::Direct);
    }

    #[test]
    fn unknown_bot_never_matches_mentions() {
        let msg = RtmMessage::message("C1", "U1", "<@U2> hi");
        assert_eq!(classify_chat(&msg, &UserId::new("")), Category::Ambient);
    }

    #[test]
    fn join_subtypes() {
        assert_eq!(
            event_kind(&join("channel_join", "UBOT"), &bot()),
            EventKind::Join(Category::RoomJoin)
        );
        assert_eq!(
            event_kind(&join("channel_join", "U1"), &bot()),
            EventKind::Join(Category::UserRoomJoin)
        );
        assert_eq!(
            event_kind(&join("group_join", "U1"), &bot()),
            EventKind::Join(Category::GroupJoin)
        );
        assert_eq!(
            event_kind(&join("message_changed", "U1"), &bot()),
            EventKind::Ignored
        );
    }

    #[test]
    fn non_message_frames_are_ignored() {
        let hello = RtmMessage {
            kind: "hello".into(),
            ..RtmMessage::default()
        };
        assert_eq!(event_kind(&hello, &bot()), EventKind::Ignored);
        assert_eq!(
            event_kind(&RtmMessage::message("C1", "U1", "hi"), &bot()),
            EventKind::Chat
        );
    }
}

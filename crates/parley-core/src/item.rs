// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Items exchanged with widget clients: messages and thread markers.
//!
//! The JSON shape is shared with the browser client, so field names are
//! camel-cased (`threadId`, `replyId`) and the item kind travels in `type`.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Item identifier. Allocation order is the sort order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl ItemId {
    /// The root list; messages outside any thread carry this thread id.
    pub const ROOT: ItemId = ItemId(0);

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Allocate a new item id from the wall clock in nanoseconds.
///
/// Ids are strictly increasing within the process even when the clock
/// stalls or two calls land on the same nanosecond.
pub fn next_item_id() -> ItemId {
    let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_ID.compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return ItemId(candidate),
            Err(seen) => last = seen,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Message,
    Thread,
    /// A message re-sent to the client with new content for an existing id.
    Update,
}

/// Points at the adjacent item in the same thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub id: ItemId,
}

/// Whether an item came from the bot or from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Bot,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttachmentType {
    Image,
    Audio,
    Video,
    Location,
    FileDownload,
}

/// A media or location attachment on a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<f64>,
}

impl Attachment {
    fn with_url(kind: AttachmentType, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: Some(url.into()),
            title: None,
            text: None,
            alt: None,
            lat: None,
            long: None,
        }
    }

    pub fn image(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            alt: Some(alt.into()),
            ..Self::with_url(AttachmentType::Image, url)
        }
    }

    pub fn audio(url: impl Into<String>) -> Self {
        Self::with_url(AttachmentType::Audio, url)
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self::with_url(AttachmentType::Video, url)
    }

    pub fn file_download(url: impl Into<String>) -> Self {
        Self::with_url(AttachmentType::FileDownload, url)
    }

    pub fn location(lat: f64, long: f64) -> Self {
        Self {
            kind: AttachmentType::Location,
            url: None,
            title: None,
            text: None,
            alt: None,
            lat: Some(lat),
            long: Some(long),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A single chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ItemSource>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub thread_id: ItemId,
    #[serde(default)]
    pub reply_id: ItemId,
    #[serde(default)]
    pub id: ItemId,
    #[serde(default)]
    pub prev: Option<Cursor>,
    #[serde(default)]
    pub next: Option<Cursor>,
}

impl Message {
    /// A plain text message with everything else unset.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Marker opening a thread. Its id is the id of the message that started it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// The thread this marker lives in (usually the root list).
    #[serde(default)]
    pub thread_id: ItemId,
    pub id: ItemId,
    #[serde(default)]
    pub prev: Option<Cursor>,
    #[serde(default)]
    pub next: Option<Cursor>,
}

impl Thread {
    /// A thread rooted at `source`, living in the same list as `source`.
    pub fn from_message(source: &Message) -> Self {
        Self {
            thread_id: source.thread_id,
            id: source.id,
            prev: None,
            next: None,
        }
    }
}

/// Anything stored in an item store or sent to a widget client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    Message(Message),
    Thread(Thread),
    /// New content for an already delivered message.
    Update(Message),
}

impl Item {
    pub fn id(&self) -> ItemId {
        match self {
            Item::Message(m) | Item::Update(m) => m.id,
            Item::Thread(t) => t.id,
        }
    }

    pub fn thread_id(&self) -> ItemId {
        match self {
            Item::Message(m) | Item::Update(m) => m.thread_id,
            Item::Thread(t) => t.thread_id,
        }
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            Item::Message(_) => ItemType::Message,
            Item::Thread(_) => ItemType::Thread,
            Item::Update(_) => ItemType::Update,
        }
    }

    /// Cursor naming this item. Updates point at the message they replace.
    pub fn cursor(&self) -> Cursor {
        let item_type = match self {
            Item::Thread(_) => ItemType::Thread,
            _ => ItemType::Message,
        };
        Cursor {
            item_type,
            id: self.id(),
        }
    }

    pub fn prev(&self) -> Option<Cursor> {
        match self {
            Item::Message(m) | Item::Update(m) => m.prev,
            Item::Thread(t) => t.prev,
        }
    }

    pub fn next(&self) -> Option<Cursor> {
        match self {
            Item::Message(m) | Item::Update(m) => m.next,
            Item::Thread(t) => t.next,
        }
    }

    pub fn set_prev(&mut self, cursor: Option<Cursor>) {
        match self {
            Item::Message(m) | Item::Update(m) => m.prev = cursor,
            Item::Thread(t) => t.prev = cursor,
        }
    }

    pub fn set_next(&mut self, cursor: Option<Cursor>) {
        match self {
            Item::Message(m) | Item::Update(m) => m.next = cursor,
            Item::Thread(t) => t.next = cursor,
        }
    }

    /// Stored form of the item: updates are kept as plain messages.
    pub fn into_stored(self) -> Item {
        match self {
            Item::Update(m) => Item::Message(m),
            other => other,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Item::Message(m) | Item::Update(m) => Some(m),
            Item::Thread(_) => None,
        }
    }
}

impl From<Message> for Item {
    fn from(m: Message) -> Self {
        Item::Message(m)
    }
}

impl From<Thread> for Item {
    fn from(t: Thread) -> Self {
        Item::Thread(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_json_shape() {
        let item = Item::Message(Message {
            text: "hi".into(),
            source: Some(ItemSource::Bot),
            thread_id: ItemId(7),
            reply_id: ItemId(3),
            id: ItemId(9),
            prev: Some(Cursor {
                item_type: ItemType::Thread,
                id: ItemId(7),
            }),
            ..Message::default()
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["threadId"], 7);
        assert_eq!(json["replyId"], 3);
        assert_eq!(json["source"], "bot");
        assert_eq!(json["prev"]["type"], "thread");
        assert!(json["next"].is_null());
    }

    #[test]
    fn client_message_decodes_with_defaults() {
        let item: Item = serde_json::from_str(r#"{"type":"message","text":"hello"}"#).unwrap();
        assert_eq!(item.item_type(), ItemType::Message);
        assert_eq!(item.id(), ItemId(0));
        assert_eq!(item.thread_id(), ItemId::ROOT);
        assert_eq!(item.as_message().unwrap().text, "hello");
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<Item>(r#"{"type":"bogus","id":1}"#).is_err());
    }

    #[test]
    fn update_is_stored_as_message() {
        let update = Item::Update(Message::text("edited"));
        assert_eq!(update.cursor().item_type, ItemType::Message);
        assert_eq!(update.into_stored().item_type(), ItemType::Message);
    }

    #[test]
    fn thread_from_message_takes_its_id() {
        let mut m = Message::text("root");
        m.id = ItemId(42);
        let t = Thread::from_message(&m);
        assert_eq!(t.id, ItemId(42));
        assert_eq!(t.thread_id, ItemId::ROOT);
    }

    #[test]
    fn attachment_builders() {
        let a = Attachment::image("https://x/img.png", "an image").with_title("pic");
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["title"], "pic");
        assert!(json.get("lat").is_none());

        let loc = serde_json::to_value(Attachment::location(1.5, -2.0)).unwrap();
        assert_eq!(loc["type"], "location");
        assert_eq!(loc["long"], -2.0);
    }

    #[test]
    fn item_ids_strictly_increase() {
        let ids: Vec<ItemId> = (0..1000).map(|_| next_item_id()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}

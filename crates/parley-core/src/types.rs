// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common identity and routing types shared by every Parley crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Isolation boundary: one chat-platform workspace or one widget session.
    TenantId
);
string_id!(
    /// A user inside a tenant.
    UserId
);
string_id!(
    /// A conversational space (direct message, group, channel) inside a tenant.
    RoomId
);

/// Key of a live conversation instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub tenant: TenantId,
    pub user: UserId,
    pub room: RoomId,
}

impl ConversationKey {
    pub fn new(tenant: impl Into<TenantId>, user: impl Into<UserId>, room: impl Into<RoomId>) -> Self {
        Self {
            tenant: tenant.into(),
            user: user.into(),
            room: room.into(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.tenant, self.user, self.room)
    }
}

/// Backslash-escape `\` and `:` so an id can sit inside a `:`-separated
/// storage key without running into the next field.
pub fn escape_key_part(part: &str) -> String {
    part.replace('\\', "\\\\").replace(':', "\\:")
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Mutually exclusive classification of an inbound chat event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Sent by the bot's own identity.
    #[strum(serialize = "self")]
    #[serde(rename = "self")]
    SelfMessage,
    Direct,
    DirectMention,
    Mention,
    Ambient,
    RoomJoin,
    UserRoomJoin,
    GroupJoin,
}

impl Category {
    /// All categories in classification order.
    pub const ALL: [Category; 8] = [
        Category::SelfMessage,
        Category::Direct,
        Category::DirectMention,
        Category::Mention,
        Category::Ambient,
        Category::RoomJoin,
        Category::UserRoomJoin,
        Category::GroupJoin,
    ];

    pub fn is_join(self) -> bool {
        matches!(
            self,
            Category::RoomJoin | Category::UserRoomJoin | Category::GroupJoin
        )
    }
}

/// A frame read from a tenant's duplex connection. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub tenant: TenantId,
    pub payload: String,
}

/// Credentials and identity of one installed chat-platform bot.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotRecord {
    /// Workspace the bot is installed in.
    pub tenant: TenantId,
    /// The bot's own user id, used for self/mention classification.
    pub bot_user_id: UserId,
    /// Bot access token for REST calls.
    pub token: String,
}

impl fmt::Debug for BotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotRecord")
            .field("tenant", &self.tenant)
            .field("bot_user_id", &self.bot_user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

//! Identifier and message types for the Ripple realtime protocol.
//!
//! User and conversation identifiers are numeric on the wire, but some server
//! builds emit them as numeric strings, so both forms are accepted on decode.
//! Message identifiers come in two disjoint spaces: server-assigned ids and
//! locally generated temporary ids for optimistic sends.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Numeric id as the server may emit it: a JSON number or a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumericId {
    Number(u64),
    Text(String),
}

impl RawNumericId {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected numeric id, got {s:?}"))),
        }
    }
}

/// Parse a numeric id from a loosely typed JSON value.
///
/// Accepts non-negative integers and numeric strings; anything else is `None`.
#[must_use]
pub fn numeric_id(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

macro_rules! numeric_id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw numeric identifier.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw numeric identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawNumericId::deserialize(deserializer)?.into_u64().map(Self)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id_type!(
    /// Identifies a user account on the Ripple server.
    UserId
);

numeric_id_type!(
    /// Identifies a conversation.
    ///
    /// For private chats this is the other participant's user id; for group
    /// chats it is the group id.
    ConversationId
);

impl From<UserId> for ConversationId {
    fn from(user: UserId) -> Self {
        Self(user.0)
    }
}

/// Identifies a chat message.
///
/// Server-assigned ids and local temporary ids live in separate variants, so
/// an optimistic id can never be mistaken for one the server handed out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Id assigned by the server (numbers are kept in their decimal form).
    Server(String),
    /// Temporary id generated for an optimistic send (UUID v7).
    Local(Uuid),
}

impl MessageId {
    /// Creates a fresh temporary id for an optimistic send.
    #[must_use]
    pub fn local() -> Self {
        Self::Local(Uuid::now_v7())
    }

    /// Creates a server-assigned id.
    pub fn server(id: impl Into<String>) -> Self {
        Self::Server(id.into())
    }

    /// Parse a server id from a loosely typed JSON value (number or string).
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Some(Self::Server(n.to_string())),
            serde_json::Value::String(s) if !s.is_empty() => Some(Self::Server(s.clone())),
            _ => None,
        }
    }

    /// Returns `true` for temporary ids created by [`MessageId::local`].
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid message id: {value}")))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Local(uuid) => write!(f, "local-{uuid}"),
        }
    }
}

/// Whether a message belongs to a one-to-one or a group conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    /// Direct message between two users.
    #[default]
    #[serde(alias = "private_message", alias = "direct")]
    Private,
    /// Message posted to a group.
    #[serde(alias = "group_message")]
    Group,
}

impl ChatKind {
    /// The `type` discriminator used for chat frames of this kind.
    #[must_use]
    pub const fn frame_type(self) -> &'static str {
        match self {
            Self::Private => "private_message",
            Self::Group => "group_message",
        }
    }
}

impl std::fmt::Display for ChatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// Delivery status of a message.
///
/// Ordered so that later states compare greater: a status may only move
/// forward, see [`MessageStatus::advance`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Handed to the transport, not yet confirmed by the server.
    #[default]
    Sending,
    /// Accepted by the server / delivered to the recipient.
    Delivered,
    /// Seen by the recipient.
    Read,
}

impl MessageStatus {
    /// Move to `next` if it is later than the current status.
    ///
    /// Returns `true` when the status changed.
    pub fn advance(&mut self, next: Self) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sending => write!(f, "sending"),
            Self::Delivered => write!(f, "delivered"),
            Self::Read => write!(f, "read"),
        }
    }
}

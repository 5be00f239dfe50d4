//! Record shapes returned by the Ripple REST API.
//!
//! The realtime client only reads two collections: the conversation list
//! and a conversation's message history. Both tolerate the snake_case and
//! camelCase spellings the different front ends have used.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::message::{ChatKind, ConversationId, MessageId, MessageStatus, UserId};

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(crate::codec::timestamp(&value))
}

/// One entry of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationRecord {
    /// Conversation id (participant user id or group id).
    #[serde(alias = "conversation_id", alias = "conversationId")]
    pub id: ConversationId,
    /// The other participant, for private conversations.
    #[serde(default, alias = "userId", alias = "participant_id", alias = "participantId")]
    pub user_id: Option<UserId>,
    /// Display name.
    #[serde(default, alias = "username", alias = "title")]
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(default, alias = "avatar_url", alias = "avatarUrl")]
    pub avatar: Option<String>,
    /// Preview of the most recent message.
    #[serde(default, alias = "lastMessage")]
    pub last_message: Option<String>,
    /// Time of the most recent message.
    #[serde(
        default,
        alias = "last_message_time",
        alias = "lastMessageTime",
        deserialize_with = "lenient_timestamp"
    )]
    pub last_message_at: Option<DateTime<Utc>>,
    /// Messages not yet read by the local user.
    #[serde(default, alias = "unreadCount", alias = "unread")]
    pub unread_count: u32,
    /// Whether the participant is online.
    #[serde(default, alias = "isOnline", alias = "online")]
    pub is_online: bool,
    /// Private or group conversation.
    #[serde(default, alias = "type")]
    pub kind: ChatKind,
}

/// One message of a conversation's history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageRecord {
    /// Server-assigned message id.
    pub id: MessageId,
    /// Author of the message.
    #[serde(alias = "senderId", alias = "from", alias = "user_id")]
    pub sender_id: UserId,
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Server timestamp.
    #[serde(
        default,
        alias = "created_at",
        alias = "createdAt",
        deserialize_with = "lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    /// Private or group message.
    #[serde(default, alias = "type")]
    pub kind: ChatKind,
    /// Delivery status, when the server tracks one.
    #[serde(default)]
    pub status: Option<MessageStatus>,
    /// Legacy read flag.
    #[serde(default, alias = "isRead")]
    pub is_read: bool,
}

impl MessageRecord {
    /// Effective status: stored history is at least delivered.
    #[must_use]
    pub fn effective_status(&self) -> MessageStatus {
        if self.is_read {
            return MessageStatus::Read;
        }
        self.status
            .unwrap_or(MessageStatus::Delivered)
            .max(MessageStatus::Delivered)
    }
}

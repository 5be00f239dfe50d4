//! JSON encoding and decoding of Ripple realtime frames.
//!
//! Outbound frames have a fixed shape and are serialized with serde.
//! Inbound frames are whatever the server emits, so they are decoded by hand
//! from a [`serde_json::Value`]: every payload field is optional, several
//! spellings are accepted, and unknown `type` values decode to
//! [`InboundFrame::Ignored`] instead of failing.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::message::{ChatKind, ConversationId, MessageId, UserId, numeric_id};
use crate::presence::PresenceChange;
use crate::typing::{TypingData, TypingEvent};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed, or the frame is not valid JSON.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The frame is JSON but not an object with a string `type`.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    /// A field required by this frame type is missing or unusable.
    #[error("{kind} frame is missing {field}")]
    MissingField {
        /// The frame's `type` discriminator.
        kind: String,
        /// Description of the missing field.
        field: &'static str,
    },
}

fn iso8601<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// A frame sent from the client to the realtime server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Direct message to another user.
    PrivateMessage {
        /// Message text.
        content: String,
        /// Target conversation (the recipient's user id).
        to: ConversationId,
        /// Client-side send time.
        #[serde(serialize_with = "iso8601")]
        timestamp: DateTime<Utc>,
    },
    /// Message to a group.
    GroupMessage {
        /// Message text.
        content: String,
        /// Target group.
        to: ConversationId,
        /// Client-side send time.
        #[serde(serialize_with = "iso8601")]
        timestamp: DateTime<Utc>,
    },
    /// Typing started or stopped.
    Typing {
        /// Conversation being typed in.
        to: ConversationId,
        /// Typing flag.
        data: TypingData,
        /// Client-side time of the keystroke.
        #[serde(serialize_with = "iso8601")]
        timestamp: DateTime<Utc>,
    },
}

impl OutboundFrame {
    /// Builds a chat frame of the given kind.
    #[must_use]
    pub const fn chat(
        kind: ChatKind,
        content: String,
        to: ConversationId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        match kind {
            ChatKind::Private => Self::PrivateMessage {
                content,
                to,
                timestamp,
            },
            ChatKind::Group => Self::GroupMessage {
                content,
                to,
                timestamp,
            },
        }
    }
}

/// A chat message received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Server-assigned id, if the frame carries one.
    pub id: Option<MessageId>,
    /// Private or group message.
    pub kind: ChatKind,
    /// Sender of the message.
    pub sender: Option<UserId>,
    /// Raw `to` field: recipient user for private chats, group for group chats.
    pub to: Option<u64>,
    /// Explicit conversation id, when the server names one.
    pub conversation: Option<ConversationId>,
    /// Message text (empty when absent).
    pub content: String,
    /// Server timestamp, when present and parseable.
    pub timestamp: Option<DateTime<Utc>>,
}

impl IncomingMessage {
    /// Work out which local conversation this message belongs to.
    ///
    /// An explicit conversation id wins. Group messages are addressed by
    /// `to`. Private messages belong to the other participant: the recipient
    /// when the local user sent it (a server echo), the sender otherwise.
    #[must_use]
    pub fn conversation_for(&self, local_user: UserId) -> Option<ConversationId> {
        if self.conversation.is_some() {
            return self.conversation;
        }
        match self.kind {
            ChatKind::Group => self.to.map(ConversationId::new),
            ChatKind::Private => match self.sender {
                Some(sender) if sender == local_user => self.to.map(ConversationId::new),
                Some(sender) => Some(ConversationId::from(sender)),
                None => self.to.map(ConversationId::new),
            },
        }
    }
}

/// Which message(s) a delivery or read receipt refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptTarget {
    /// A single message.
    Message(MessageId),
    /// Every message the local user sent in a conversation.
    Conversation(ConversationId),
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// `private_message` / `group_message`.
    Chat(IncomingMessage),
    /// `typing`.
    Typing(TypingEvent),
    /// `user_list`, `user_online`, `user_offline`.
    Presence(PresenceChange),
    /// `message_delivered` / `delivered`.
    Delivered(ReceiptTarget),
    /// `message_read` / `read_status`.
    Read(ReceiptTarget),
    /// `error`: server-reported error string.
    Error(String),
    /// Any other type (`heartbeat`, `presence`, `notification`, ...).
    Ignored(String),
}

/// Encodes an [`OutboundFrame`] as a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the frame cannot be serialized.
pub fn encode(frame: &OutboundFrame) -> Result<String, CodecError> {
    serde_json::to_string(frame).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes one inbound JSON text frame.
///
/// # Errors
///
/// - `CodecError::Serialization` if the text is not JSON.
/// - `CodecError::InvalidFrame` if it is not an object with a string `type`.
/// - `CodecError::MissingField` if a known frame type lacks its key field.
pub fn decode(text: &str) -> Result<InboundFrame, CodecError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| CodecError::Serialization(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(CodecError::InvalidFrame("frame is not a JSON object".into()));
    };
    let Some(kind) = obj.get("type").and_then(Value::as_str) else {
        return Err(CodecError::InvalidFrame("missing string `type`".into()));
    };
    let data = obj.get("data").and_then(Value::as_object);

    let frame = match kind {
        "private_message" => InboundFrame::Chat(decode_chat(&obj, data, ChatKind::Private)),
        "group_message" => InboundFrame::Chat(decode_chat(&obj, data, ChatKind::Group)),
        "typing" => InboundFrame::Typing(decode_typing(kind, &obj, data)?),
        "user_list" => InboundFrame::Presence(decode_user_list(kind, &obj, data)?),
        "user_online" => InboundFrame::Presence(PresenceChange::Online(
            presence_user(&obj, data).ok_or_else(|| missing(kind, "user id"))?,
        )),
        "user_offline" => InboundFrame::Presence(PresenceChange::Offline(
            presence_user(&obj, data).ok_or_else(|| missing(kind, "user id"))?,
        )),
        "message_delivered" | "delivered" => InboundFrame::Delivered(
            receipt_target(&obj, data).ok_or_else(|| missing(kind, "message id"))?,
        ),
        "message_read" | "read_status" => InboundFrame::Read(
            receipt_target(&obj, data).ok_or_else(|| missing(kind, "message id"))?,
        ),
        "error" => InboundFrame::Error(
            text_field(&obj, data, &["message", "error"])
                .unwrap_or_else(|| "unknown server error".to_string()),
        ),
        other => InboundFrame::Ignored(other.to_string()),
    };
    Ok(frame)
}

fn missing(kind: &str, field: &'static str) -> CodecError {
    CodecError::MissingField {
        kind: kind.to_string(),
        field,
    }
}

/// First present, non-null value among `keys`, looking at the frame first and
/// its `data` object second.
fn field<'a>(
    obj: &'a Map<String, Value>,
    data: Option<&'a Map<String, Value>>,
    keys: &[&str],
) -> Option<&'a Value> {
    let lookup = |map: &'a Map<String, Value>| {
        keys.iter()
            .filter_map(|k| map.get(*k))
            .find(|v| !v.is_null())
    };
    lookup(obj).or_else(|| data.and_then(lookup))
}

fn numeric_field(
    obj: &Map<String, Value>,
    data: Option<&Map<String, Value>>,
    keys: &[&str],
) -> Option<u64> {
    field(obj, data, keys).and_then(numeric_id)
}

fn text_field(
    obj: &Map<String, Value>,
    data: Option<&Map<String, Value>>,
    keys: &[&str],
) -> Option<String> {
    field(obj, data, keys).and_then(Value::as_str).map(str::to_string)
}

const SENDER_KEYS: &[&str] = &["from", "sender_id", "senderId", "userId", "user_id"];
const CONVERSATION_KEYS: &[&str] = &["conversation_id", "conversationId"];

/// Parse an RFC 3339 string or an epoch-milliseconds number.
pub(crate) fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn decode_chat(
    obj: &Map<String, Value>,
    data: Option<&Map<String, Value>>,
    kind: ChatKind,
) -> IncomingMessage {
    let to_keys: &[&str] = match kind {
        ChatKind::Group => &["to", "group_id", "groupId"],
        ChatKind::Private => &["to", "recipient_id", "recipientId"],
    };
    IncomingMessage {
        id: field(obj, data, &["id", "messageId", "message_id"]).and_then(MessageId::from_json),
        kind,
        sender: numeric_field(obj, data, SENDER_KEYS).map(UserId::new),
        to: numeric_field(obj, data, to_keys),
        conversation: numeric_field(obj, data, CONVERSATION_KEYS).map(ConversationId::new),
        content: text_field(obj, data, &["content", "message", "text"]).unwrap_or_default(),
        timestamp: field(obj, data, &["timestamp", "created_at", "createdAt"]).and_then(timestamp),
    }
}

fn decode_typing(
    kind: &str,
    obj: &Map<String, Value>,
    data: Option<&Map<String, Value>>,
) -> Result<TypingEvent, CodecError> {
    let user = numeric_field(obj, data, SENDER_KEYS).ok_or_else(|| missing(kind, "user id"))?;
    // A typing frame without a flag is a start signal.
    let is_typing = field(obj, data, &["is_typing", "isTyping"])
        .and_then(Value::as_bool)
        .unwrap_or(true);
    Ok(TypingEvent {
        user: UserId::new(user),
        conversation: numeric_field(obj, data, CONVERSATION_KEYS).map(ConversationId::new),
        to: numeric_field(obj, data, &["to", "group_id", "groupId"]),
        is_typing,
    })
}

fn decode_user_list(
    kind: &str,
    obj: &Map<String, Value>,
    data: Option<&Map<String, Value>>,
) -> Result<PresenceChange, CodecError> {
    let users = field(obj, data, &["users"])
        .and_then(Value::as_array)
        .ok_or_else(|| missing(kind, "users array"))?;
    let ids = users
        .iter()
        .filter_map(|user| match user {
            Value::Object(entry) => {
                numeric_field(entry, None, &["id", "user_id", "userId"]).map(UserId::new)
            }
            other => numeric_id(other).map(UserId::new),
        })
        .collect();
    Ok(PresenceChange::Snapshot(ids))
}

fn presence_user(obj: &Map<String, Value>, data: Option<&Map<String, Value>>) -> Option<UserId> {
    numeric_field(obj, data, &["userId", "user_id", "from", "id"]).map(UserId::new)
}

fn receipt_target(
    obj: &Map<String, Value>,
    data: Option<&Map<String, Value>>,
) -> Option<ReceiptTarget> {
    let id = field(obj, data, &["messageId", "message_id", "id"]).and_then(MessageId::from_json);
    if let Some(id) = id {
        return Some(ReceiptTarget::Message(id));
    }
    numeric_field(obj, data, CONVERSATION_KEYS)
        .map(|c| ReceiptTarget::Conversation(ConversationId::new(c)))
}

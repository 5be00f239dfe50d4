//! Typing indicator types for real-time keystroke status.

use serde::{Deserialize, Serialize};

use crate::message::{ConversationId, UserId};

/// Payload carried in the `data` field of a `typing` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingData {
    /// Whether the user started (`true`) or stopped (`false`) typing.
    pub is_typing: bool,
}

/// A typing indicator received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingEvent {
    /// The user who is typing (or stopped typing).
    pub user: UserId,
    /// Explicit conversation id, when the server names one.
    pub conversation: Option<ConversationId>,
    /// Raw `to` field: the group id, or the local user for private chats.
    pub to: Option<u64>,
    /// Whether the user is currently typing.
    pub is_typing: bool,
}

impl TypingEvent {
    /// Work out which local conversation this indicator belongs to.
    ///
    /// An explicit conversation id wins. Otherwise a `to` that is not the
    /// local user names a group; a private indicator belongs to the
    /// conversation with the typist.
    #[must_use]
    pub fn conversation_for(&self, local_user: UserId) -> ConversationId {
        if let Some(conversation) = self.conversation {
            return conversation;
        }
        match self.to {
            Some(to) if to != local_user.get() => ConversationId::new(to),
            _ => ConversationId::from(self.user),
        }
    }
}

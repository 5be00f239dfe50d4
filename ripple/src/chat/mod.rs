//! Client-side chat state.
//!
//! [`ChatState`] is the synchronous store behind the realtime client: the
//! conversation list, per-conversation message lists, unread counters, the
//! online user set, and the selected conversation. It performs no I/O and
//! owns no timers, so every mutation is a plain method call that the client
//! makes while holding its state lock.

pub mod typing;

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};

use ripple_proto::codec::{IncomingMessage, ReceiptTarget};
use ripple_proto::message::{ChatKind, ConversationId, MessageId, MessageStatus, UserId};
use ripple_proto::presence::PresenceChange;
use ripple_proto::record::{ConversationRecord, MessageRecord};

/// A conversation as shown in the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Conversation id (peer user id for private chats, group id for groups).
    pub id: ConversationId,
    /// The other participant of a private chat.
    pub participant: Option<UserId>,
    /// Display name, if the server provided one.
    pub name: Option<String>,
    /// Avatar URL, if the server provided one.
    pub avatar: Option<String>,
    /// Private or group.
    pub kind: ChatKind,
    /// Preview of the most recent message.
    pub last_message: Option<String>,
    /// Time of the most recent message.
    pub last_message_at: Option<DateTime<Utc>>,
    /// Messages received while this conversation was not selected.
    pub unread: u32,
    /// Whether the participant of a private chat is online.
    pub online: bool,
}

impl Conversation {
    /// Create an empty conversation.
    ///
    /// Private conversations are keyed by the peer's user id, so the
    /// participant is derived from `id`.
    #[must_use]
    pub const fn new(id: ConversationId, kind: ChatKind) -> Self {
        let participant = match kind {
            ChatKind::Private => Some(UserId::new(id.get())),
            ChatKind::Group => None,
        };
        Self {
            id,
            participant,
            name: None,
            avatar: None,
            kind,
            last_message: None,
            last_message_at: None,
            unread: 0,
            online: false,
        }
    }

    /// Update the preview if `message` is at least as recent as the current one.
    fn touch(&mut self, message: &Message) {
        let newer = self
            .last_message_at
            .is_none_or(|current| message.timestamp >= current);
        if newer {
            self.last_message = Some(message.content.clone());
            self.last_message_at = Some(message.timestamp);
        }
    }
}

/// A chat message held by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server id, or a local id while the send is unconfirmed.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub conversation: ConversationId,
    /// Author of the message.
    pub sender: UserId,
    /// Text content.
    pub content: String,
    /// Send time (local clock for optimistic sends, server clock otherwise).
    pub timestamp: DateTime<Utc>,
    /// Private or group.
    pub kind: ChatKind,
    /// Delivery status. Only ever moves forward.
    pub status: MessageStatus,
}

impl Message {
    fn from_incoming(
        conversation: ConversationId,
        sender: UserId,
        incoming: &IncomingMessage,
        status: MessageStatus,
    ) -> Self {
        Self {
            id: incoming.id.clone().unwrap_or_else(MessageId::local),
            conversation,
            sender,
            content: incoming.content.clone(),
            timestamp: incoming.timestamp.unwrap_or_else(Utc::now),
            kind: incoming.kind,
            status,
        }
    }

    fn from_record(conversation: ConversationId, record: &MessageRecord) -> Self {
        Self {
            id: record.id.clone(),
            conversation,
            sender: record.sender_id,
            content: record.content.clone(),
            timestamp: record.timestamp.unwrap_or_else(Utc::now),
            kind: record.kind,
            status: record.effective_status(),
        }
    }
}

/// Result of storing a message sent by someone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The message was appended.
    Added(Message),
    /// A message with the same server id is already stored.
    Duplicate,
}

/// Result of storing the server's echo of a message the local user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoOutcome {
    /// A pending optimistic message was matched and now carries the server id.
    Reconciled {
        /// The temporary id the message had before.
        local_id: MessageId,
        /// The message after reconciliation.
        message: Message,
    },
    /// No pending message matched (sent from another session); appended.
    Added(Message),
    /// A message with the same server id is already stored.
    Duplicate,
}

/// A status change produced by a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Conversation holding the message.
    pub conversation: ConversationId,
    /// The message whose status moved.
    pub message_id: MessageId,
    /// The new status.
    pub status: MessageStatus,
}

/// Conversations, messages, unread counts and presence for one local user.
#[derive(Debug)]
pub struct ChatState {
    local_user: UserId,
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    online: BTreeSet<UserId>,
    selected: Option<ConversationId>,
    history_loaded: HashSet<ConversationId>,
}

impl ChatState {
    /// Create an empty store for `local_user`.
    #[must_use]
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            conversations: HashMap::new(),
            messages: HashMap::new(),
            online: BTreeSet::new(),
            selected: None,
            history_loaded: HashSet::new(),
        }
    }

    /// The authenticated user.
    #[must_use]
    pub const fn local_user(&self) -> UserId {
        self.local_user
    }

    /// Look up a conversation.
    #[must_use]
    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.get(&id)
    }

    /// All conversations, most recently active first.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut list: Vec<Conversation> = self.conversations.values().cloned().collect();
        list.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        list
    }

    /// Messages of a conversation in arrival order.
    #[must_use]
    pub fn messages(&self, id: ConversationId) -> &[Message] {
        self.messages.get(&id).map_or(&[], Vec::as_slice)
    }

    /// The selected conversation, if any.
    #[must_use]
    pub const fn selected(&self) -> Option<ConversationId> {
        self.selected
    }

    /// Users currently online, in id order.
    #[must_use]
    pub fn online_users(&self) -> Vec<UserId> {
        self.online.iter().copied().collect()
    }

    /// Whether `user` is online.
    #[must_use]
    pub fn is_online(&self, user: UserId) -> bool {
        self.online.contains(&user)
    }

    /// Whether the history of `id` still has to be fetched.
    #[must_use]
    pub fn needs_history(&self, id: ConversationId) -> bool {
        !self.history_loaded.contains(&id)
    }

    /// Merge the conversation list returned by the REST API.
    ///
    /// Returns the number of records merged.
    pub fn load_conversations(&mut self, records: &[ConversationRecord]) -> usize {
        for record in records {
            let selected = self.selected == Some(record.id);
            let online_now = record.user_id.is_some_and(|u| self.is_online(u));
            let conversation = self
                .conversations
                .entry(record.id)
                .or_insert_with(|| Conversation::new(record.id, record.kind));

            conversation.kind = record.kind;
            if record.user_id.is_some() {
                conversation.participant = record.user_id;
            }
            if record.name.is_some() {
                conversation.name.clone_from(&record.name);
            }
            if record.avatar.is_some() {
                conversation.avatar.clone_from(&record.avatar);
            }
            if record.last_message_at >= conversation.last_message_at {
                conversation.last_message.clone_from(&record.last_message);
                conversation.last_message_at = record.last_message_at;
            }
            conversation.unread = if selected { 0 } else { record.unread_count };
            conversation.online = record.is_online || online_now;
        }
        records.len()
    }

    /// Make `id` the selected conversation and clear its unread counter.
    ///
    /// Creates an empty private conversation if `id` is unknown.
    pub fn select(&mut self, id: ConversationId) {
        self.selected = Some(id);
        self.ensure_conversation(id, ChatKind::Private).unread = 0;
    }

    /// Merge fetched history into conversation `id`.
    ///
    /// Messages already present (by server id) only have their status
    /// advanced. A record the local user sent takes over the oldest
    /// optimistic message with the same content, otherwise optimistic
    /// messages are kept. Returns the number of messages added.
    pub fn load_history(&mut self, id: ConversationId, records: &[MessageRecord]) -> usize {
        let kind = records.first().map_or(ChatKind::Private, |r| r.kind);
        self.ensure_conversation(id, kind);

        let me = self.local_user;
        let list = self.messages.entry(id).or_default();
        let mut added = 0;
        for record in records {
            if let Some(existing) = list.iter_mut().find(|m| m.id == record.id) {
                existing.status.advance(record.effective_status());
            } else if let Some(pending) = list.iter_mut().find(|m| {
                record.sender_id == me && m.id.is_local() && m.content == record.content
            }) {
                pending.id = record.id.clone();
                if let Some(timestamp) = record.timestamp {
                    pending.timestamp = timestamp;
                }
                pending.status.advance(record.effective_status());
            } else {
                list.push(Message::from_record(id, record));
                added += 1;
            }
        }
        list.sort_by_key(|m| m.timestamp);
        let latest = list.last().cloned();

        self.history_loaded.insert(id);
        if let Some(conversation) = self.conversations.get_mut(&id) {
            if let Some(latest) = &latest {
                conversation.touch(latest);
            }
            if self.selected == Some(id) {
                conversation.unread = 0;
            }
        }
        added
    }

    /// Append an optimistic message the local user just sent.
    pub fn push_outgoing(&mut self, message: Message) {
        self.ensure_conversation(message.conversation, message.kind)
            .touch(&message);
        self.messages
            .entry(message.conversation)
            .or_default()
            .push(message);
    }

    /// Store a message authored by another user.
    ///
    /// Bumps the unread counter unless the conversation is selected.
    pub fn receive(
        &mut self,
        conversation: ConversationId,
        sender: UserId,
        incoming: &IncomingMessage,
    ) -> ReceiveOutcome {
        if self.contains_server_id(conversation, incoming.id.as_ref()) {
            return ReceiveOutcome::Duplicate;
        }

        let message = Message::from_incoming(
            conversation,
            sender,
            incoming,
            MessageStatus::Delivered,
        );
        let selected = self.selected == Some(conversation);
        let entry = self.ensure_conversation(conversation, incoming.kind);
        entry.touch(&message);
        if !selected {
            entry.unread = entry.unread.saturating_add(1);
        }
        self.messages
            .entry(conversation)
            .or_default()
            .push(message.clone());
        ReceiveOutcome::Added(message)
    }

    /// Store the server's copy of a message the local user sent.
    ///
    /// The oldest optimistic message in `conversation` with the same content
    /// is replaced in place: it takes the server id and timestamp and moves
    /// to at least [`MessageStatus::Delivered`]. A receipt that arrived
    /// before the echo is kept. Never touches unread counters.
    pub fn reconcile_echo(
        &mut self,
        conversation: ConversationId,
        incoming: &IncomingMessage,
    ) -> EchoOutcome {
        if self.contains_server_id(conversation, incoming.id.as_ref()) {
            return EchoOutcome::Duplicate;
        }

        let pending = self.messages.get_mut(&conversation).and_then(|list| {
            list.iter_mut()
                .find(|m| m.id.is_local() && m.content == incoming.content)
        });

        if let Some(message) = pending {
            let local_id = message.id.clone();
            if let Some(server_id) = &incoming.id {
                message.id = server_id.clone();
            }
            if let Some(timestamp) = incoming.timestamp {
                message.timestamp = timestamp;
            }
            message.status.advance(MessageStatus::Delivered);
            let message = message.clone();
            if let Some(entry) = self.conversations.get_mut(&conversation) {
                entry.touch(&message);
            }
            return EchoOutcome::Reconciled { local_id, message };
        }

        let message = Message::from_incoming(
            conversation,
            self.local_user,
            incoming,
            MessageStatus::Delivered,
        );
        self.ensure_conversation(conversation, incoming.kind)
            .touch(&message);
        self.messages
            .entry(conversation)
            .or_default()
            .push(message.clone());
        EchoOutcome::Added(message)
    }

    /// Apply a delivery or read receipt.
    ///
    /// A message-level receipt advances that message wherever it is stored.
    /// A conversation-level receipt advances every message the local user
    /// sent in that conversation. Returns the messages whose status moved.
    pub fn apply_receipt(
        &mut self,
        target: &ReceiptTarget,
        status: MessageStatus,
    ) -> Vec<StatusUpdate> {
        let local_user = self.local_user;
        let mut updates = Vec::new();
        let mut advance = |message: &mut Message| {
            if message.status.advance(status) {
                updates.push(StatusUpdate {
                    conversation: message.conversation,
                    message_id: message.id.clone(),
                    status: message.status,
                });
            }
        };

        match target {
            ReceiptTarget::Message(id) => {
                if let Some(message) = self
                    .messages
                    .values_mut()
                    .flat_map(|list| list.iter_mut())
                    .find(|m| &m.id == id)
                {
                    advance(message);
                }
            }
            ReceiptTarget::Conversation(conversation) => {
                if let Some(list) = self.messages.get_mut(conversation) {
                    list.iter_mut()
                        .filter(|m| m.sender == local_user)
                        .for_each(&mut advance);
                }
            }
        }
        updates
    }

    /// Apply a presence change. Returns `true` if the online set changed.
    pub fn apply_presence(&mut self, change: &PresenceChange) -> bool {
        let changed = match change {
            PresenceChange::Snapshot(users) => {
                let next: BTreeSet<UserId> = users.iter().copied().collect();
                let changed = next != self.online;
                self.online = next;
                changed
            }
            PresenceChange::Online(user) => self.online.insert(*user),
            PresenceChange::Offline(user) => self.online.remove(user),
        };

        if changed {
            for conversation in self.conversations.values_mut() {
                if let Some(participant) = conversation.participant {
                    conversation.online = self.online.contains(&participant);
                }
            }
        }
        changed
    }

    fn ensure_conversation(&mut self, id: ConversationId, kind: ChatKind) -> &mut Conversation {
        let online = &self.online;
        self.conversations.entry(id).or_insert_with(|| {
            let mut conversation = Conversation::new(id, kind);
            conversation.online = conversation
                .participant
                .is_some_and(|user| online.contains(&user));
            conversation
        })
    }

    fn contains_server_id(&self, conversation: ConversationId, id: Option<&MessageId>) -> bool {
        id.is_some_and(|id| self.messages(conversation).iter().any(|m| &m.id == id))
    }
}

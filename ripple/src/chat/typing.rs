//! Typing indicator bookkeeping.
//!
//! Each `(conversation, user)` pair has at most one live expiry timer. A new
//! `is_typing = true` event replaces the previous timer, so the indicator
//! disappears a fixed time after the *last* typing event. Every timer carries
//! a token; an expiry whose token no longer matches the stored one was
//! superseded and is ignored.

use std::collections::{BTreeSet, HashMap};

use tokio::task::AbortHandle;

use ripple_proto::message::{ConversationId, UserId};

#[derive(Debug)]
struct TimerEntry {
    token: u64,
    abort: AbortHandle,
}

/// Tracks which users are typing in which conversation.
#[derive(Debug, Default)]
pub struct TypingTracker {
    timers: HashMap<(ConversationId, UserId), TimerEntry>,
    typists: HashMap<ConversationId, BTreeSet<UserId>>,
    next_token: u64,
}

impl TypingTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a token for a timer about to be started.
    pub fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Record that `user` is typing in `conversation`, replacing any
    /// previous timer for the pair.
    ///
    /// Returns `true` if the user was not already shown as typing.
    pub fn start(
        &mut self,
        conversation: ConversationId,
        user: UserId,
        token: u64,
        abort: AbortHandle,
    ) -> bool {
        if let Some(previous) = self
            .timers
            .insert((conversation, user), TimerEntry { token, abort })
        {
            previous.abort.abort();
        }
        self.typists.entry(conversation).or_default().insert(user)
    }

    /// Record that `user` stopped typing. Returns `true` if they were shown.
    pub fn stop(&mut self, conversation: ConversationId, user: UserId) -> bool {
        if let Some(entry) = self.timers.remove(&(conversation, user)) {
            entry.abort.abort();
        }
        self.remove_typist(conversation, user)
    }

    /// Handle a fired timer. Ignored unless `token` is the live one.
    ///
    /// Returns `true` if the user was removed.
    pub fn expire(&mut self, conversation: ConversationId, user: UserId, token: u64) -> bool {
        match self.timers.get(&(conversation, user)) {
            Some(entry) if entry.token == token => {
                self.timers.remove(&(conversation, user));
                self.remove_typist(conversation, user)
            }
            _ => false,
        }
    }

    /// Users typing in `conversation`, in id order.
    #[must_use]
    pub fn users(&self, conversation: ConversationId) -> Vec<UserId> {
        self.typists
            .get(&conversation)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `user` is shown as typing in `conversation`.
    #[must_use]
    pub fn is_typing(&self, conversation: ConversationId, user: UserId) -> bool {
        self.typists
            .get(&conversation)
            .is_some_and(|set| set.contains(&user))
    }

    /// Number of live timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Abort every timer and forget every typist.
    ///
    /// Returns the conversations that had someone typing.
    pub fn cancel_all(&mut self) -> Vec<ConversationId> {
        for (_, entry) in self.timers.drain() {
            entry.abort.abort();
        }
        let mut cleared: Vec<ConversationId> = self.typists.drain().map(|(id, _)| id).collect();
        cleared.sort_unstable();
        cleared
    }

    fn remove_typist(&mut self, conversation: ConversationId, user: UserId) -> bool {
        let Some(set) = self.typists.get_mut(&conversation) else {
            return false;
        };
        let removed = set.remove(&user);
        if set.is_empty() {
            self.typists.remove(&conversation);
        }
        removed
    }
}

impl Drop for TypingTracker {
    fn drop(&mut self) {
        for entry in self.timers.values() {
            entry.abort.abort();
        }
    }
}

//! Presence updates for online/offline user tracking.

use crate::message::UserId;

/// A change to the set of users the server reports as online.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// Full replacement of the online set (`user_list`).
    Snapshot(Vec<UserId>),
    /// One user came online (`user_online`).
    Online(UserId),
    /// One user went offline (`user_offline`).
    Offline(UserId),
}

impl PresenceChange {
    /// The user a single-user change refers to.
    #[must_use]
    pub const fn user(&self) -> Option<UserId> {
        match self {
            Self::Online(user) | Self::Offline(user) => Some(*user),
            Self::Snapshot(_) => None,
        }
    }
}

impl std::fmt::Display for PresenceChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot(users) => write!(f, "{} users online", users.len()),
            Self::Online(user) => write!(f, "user {user} online"),
            Self::Offline(user) => write!(f, "user {user} offline"),
        }
    }
}

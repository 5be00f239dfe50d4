//! Line-oriented console front end used by the `ripple` binary.
//!
//! Parses stdin lines into [`Command`]s and renders [`ClientEvent`]s as
//! human-readable lines. Kept in the library so both halves are testable
//! without a terminal.

use chrono::{DateTime, Local, Utc};

use ripple_proto::message::{ChatKind, ConversationId, UserId};

use crate::chat::Message;
use crate::client::{ClientEvent, ConnectionState};

/// A parsed console input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/open <id>`: select a conversation.
    Open(ConversationId),
    /// `/group`: toggle between private and group sends.
    ToggleGroup,
    /// `/typing`: toggle the local typing indicator.
    Typing,
    /// `/reconnect`: force a fresh connection.
    Reconnect,
    /// `/help`: list commands.
    Help,
    /// `/quit`: disconnect and exit.
    Quit,
    /// Any other non-empty line: send it as a message.
    Say(String),
    /// A slash command that could not be parsed.
    Invalid(String),
}

/// Help text printed by `/help`.
pub const HELP: &str = "\
commands:
  /open <id>   select a conversation
  /group       toggle group mode for sends
  /typing      toggle your typing indicator
  /reconnect   reconnect now
  /quit        exit
anything else is sent to the selected conversation";

/// Parse one input line. Blank lines yield `None`.
#[must_use]
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Say(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let command = match (parts.next(), parts.next()) {
        (Some("open"), Some(id)) => id.parse().map_or_else(
            |_| Command::Invalid(format!("not a conversation id: {id}")),
            |id| Command::Open(ConversationId::new(id)),
        ),
        (Some("open"), None) => Command::Invalid("usage: /open <id>".to_string()),
        (Some("group"), None) => Command::ToggleGroup,
        (Some("typing"), None) => Command::Typing,
        (Some("reconnect"), None) => Command::Reconnect,
        (Some("help"), None) => Command::Help,
        (Some("quit" | "exit"), None) => Command::Quit,
        _ => Command::Invalid(format!("unknown command: {line}")),
    };
    Some(command)
}

/// Which kind of message a send produces.
#[must_use]
pub const fn send_kind(group_mode: bool) -> ChatKind {
    if group_mode {
        ChatKind::Group
    } else {
        ChatKind::Private
    }
}

fn clock(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M").to_string()
}

fn render_message(message: &Message, local_user: UserId) -> String {
    let author = if message.sender == local_user {
        "you".to_string()
    } else {
        format!("user {}", message.sender)
    };
    format!(
        "[{}] #{} {author}: {} ({})",
        clock(message.timestamp),
        message.conversation,
        message.content,
        message.status
    )
}

/// Render an event as a console line. Events with nothing worth showing
/// yield `None`.
#[must_use]
pub fn render_event(event: &ClientEvent, local_user: UserId) -> Option<String> {
    let line = match event {
        ClientEvent::ConnectionChanged { state, attempts } => match state {
            ConnectionState::Connecting if *attempts > 0 => {
                format!("* reconnecting (attempt {attempts})")
            }
            ConnectionState::Connecting => "* connecting".to_string(),
            ConnectionState::Open => "* connected".to_string(),
            ConnectionState::Closing => "* closing".to_string(),
            ConnectionState::Closed => "* disconnected".to_string(),
        },
        ClientEvent::ReconnectScheduled { attempt, delay } => {
            format!("* retrying in {}s (attempt {attempt})", delay.as_secs())
        }
        ClientEvent::ReconnectExhausted { attempts } => {
            format!("* gave up after {attempts} attempts, type /reconnect to retry")
        }
        ClientEvent::Error(message) => format!("! {message}"),
        ClientEvent::ConversationsLoaded { count } => format!("* {count} conversations"),
        ClientEvent::HistoryLoaded {
            conversation,
            count,
        } => format!("* loaded {count} messages for #{conversation}"),
        ClientEvent::MessageAdded(message) => render_message(message, local_user),
        ClientEvent::StatusChanged {
            message_id, status, ..
        } => format!("* {message_id} {status}"),
        ClientEvent::TypingChanged {
            conversation,
            users,
        } if !users.is_empty() => {
            let names: Vec<String> = users.iter().map(ToString::to_string).collect();
            format!("* #{conversation}: {} typing", names.join(", "))
        }
        ClientEvent::PresenceChanged { online } => format!("* {} online", online.len()),
        ClientEvent::TypingChanged { .. }
        | ClientEvent::ConversationUpdated(_)
        | ClientEvent::MessageReconciled { .. } => return None,
    };
    Some(line)
}

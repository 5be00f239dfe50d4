// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::missing_docs_in_private_items,
    clippy::future_not_send
)]

//! Integration tests for inbound frame dispatch: routing chat frames to
//! conversations, unread counting, presence, server errors and tolerance of
//! malformed or unknown frames.

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use ripple::api::InMemoryApi;
use ripple::client::{ClientEvent, ClientSettings, ConnectionState, RealtimeClient};
use ripple::transport::loopback::{LoopbackConnector, ServerConn};
use ripple_proto::message::{ChatKind, ConversationId, MessageId, MessageStatus, UserId};
use ripple_proto::record::ConversationRecord;

const ME: UserId = UserId::new(1);

type Client = RealtimeClient<LoopbackConnector, InMemoryApi>;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn record(value: serde_json::Value) -> ConversationRecord {
    serde_json::from_value(value).unwrap()
}

async fn connect_with(api: InMemoryApi) -> (Client, ServerConn, mpsc::Receiver<ClientEvent>) {
    let (connector, mut server) = LoopbackConnector::create();
    let (client, mut events) =
        RealtimeClient::new(ClientSettings::new("ws://chat.test/ws", ME), connector, api);
    client.start();
    settle().await;
    let conn = server.try_accept().expect("client should have connected");
    assert_eq!(client.connection().state, ConnectionState::Open);
    while events.try_recv().is_ok() {}
    (client, conn, events)
}

async fn connect() -> (Client, ServerConn, mpsc::Receiver<ClientEvent>) {
    connect_with(InMemoryApi::new()).await
}

fn drain(events: &mut mpsc::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

#[tokio::test(start_paused = true)]
async fn private_message_lands_in_sender_conversation() {
    let (client, conn, mut events) = connect().await;

    conn.send_json(&json!({
        "type": "private_message",
        "id": "m-1",
        "from": 2,
        "to": 1,
        "content": "hello",
        "timestamp": "2024-05-01T10:00:00Z"
    }));
    settle().await;

    let messages = client.messages(ConversationId::new(2));
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.id, MessageId::server("m-1"));
    assert_eq!(message.sender, UserId::new(2));
    assert_eq!(message.content, "hello");
    assert_eq!(message.kind, ChatKind::Private);
    assert_eq!(message.status, MessageStatus::Delivered);

    let conversation = client.conversation(ConversationId::new(2)).unwrap();
    assert_eq!(conversation.unread, 1);
    assert_eq!(conversation.last_message.as_deref(), Some("hello"));

    let events = drain(&mut events);
    assert!(matches!(events[0], ClientEvent::MessageAdded(_)));
    assert_eq!(
        events[1],
        ClientEvent::ConversationUpdated(ConversationId::new(2))
    );
}

#[tokio::test(start_paused = true)]
async fn group_message_routes_to_group() {
    let (client, conn, _events) = connect().await;

    conn.send_json(&json!({
        "type": "group_message", "id": 10, "senderId": 3, "groupId": 50, "content": "all hands"
    }));
    settle().await;

    assert!(client.messages(ConversationId::new(3)).is_empty());
    let messages = client.messages(ConversationId::new(50));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, ChatKind::Group);
    assert_eq!(messages[0].sender, UserId::new(3));
    assert_eq!(
        client.conversation(ConversationId::new(50)).unwrap().kind,
        ChatKind::Group
    );
}

#[tokio::test(start_paused = true)]
async fn explicit_conversation_id_wins() {
    let (client, conn, _events) = connect().await;

    conn.send_json(&json!({
        "type": "private_message", "id": 11, "from": 2, "to": 1,
        "conversationId": 99, "content": "routed"
    }));
    settle().await;

    assert!(client.messages(ConversationId::new(2)).is_empty());
    assert_eq!(client.messages(ConversationId::new(99)).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unread_only_counts_unselected_conversations() {
    let (client, conn, _events) = connect().await;
    client.select_conversation(ConversationId::new(2));
    settle().await;

    for (id, from) in [(1, 2), (2, 3), (3, 3), (4, 2)] {
        conn.send_json(&json!({
            "type": "private_message", "id": id, "from": from, "to": 1, "content": "x"
        }));
    }
    settle().await;

    assert_eq!(client.conversation(ConversationId::new(2)).unwrap().unread, 0);
    assert_eq!(client.conversation(ConversationId::new(3)).unwrap().unread, 2);

    client.select_conversation(ConversationId::new(3));
    assert_eq!(client.conversation(ConversationId::new(3)).unwrap().unread, 0);
}

#[tokio::test(start_paused = true)]
async fn redelivered_message_is_stored_once() {
    let (client, conn, mut events) = connect().await;

    let frame = json!({
        "type": "private_message", "id": "dup", "from": 2, "to": 1, "content": "again"
    });
    conn.send_json(&frame);
    conn.send_json(&frame);
    settle().await;

    assert_eq!(client.messages(ConversationId::new(2)).len(), 1);
    assert_eq!(client.conversation(ConversationId::new(2)).unwrap().unread, 1);
    let added = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::MessageAdded(_)))
        .count();
    assert_eq!(added, 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_skipped() {
    let (client, conn, mut events) = connect().await;

    conn.send_text("not json at all");
    conn.send_text("[1, 2, 3]");
    conn.send_json(&json!({ "content": "no type" }));
    conn.send_json(&json!({ "type": "private_message", "to": 1, "content": "no sender" }));
    conn.send_json(&json!({
        "type": "private_message", "id": 5, "from": 2, "to": 1, "content": "fine"
    }));
    settle().await;

    assert_eq!(client.connection().state, ConnectionState::Open);
    let messages = client.messages(ConversationId::new(2));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "fine");
    assert!(
        !drain(&mut events)
            .iter()
            .any(|e| matches!(e, ClientEvent::Error(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_frame_type_changes_nothing() {
    let (client, conn, mut events) = connect().await;

    conn.send_json(&json!({ "type": "server_stats", "users": [1, 2, 3] }));
    settle().await;

    assert!(drain(&mut events).is_empty());
    assert!(client.online_users().is_empty());
    assert!(client.conversations().is_empty());
    assert_eq!(client.connection().state, ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn user_list_replaces_online_set() {
    let (client, conn, mut events) = connect().await;

    conn.send_json(&json!({ "type": "user_list", "users": [3, 4] }));
    conn.send_json(&json!({
        "type": "user_list",
        "data": { "users": [{ "id": 2 }, "1"] }
    }));
    settle().await;

    assert_eq!(client.online_users(), vec![UserId::new(1), UserId::new(2)]);
    let presence: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::PresenceChanged { online } => Some(online),
            _ => None,
        })
        .collect();
    assert_eq!(presence.len(), 2);
    assert_eq!(presence[1], vec![UserId::new(1), UserId::new(2)]);
}

#[tokio::test(start_paused = true)]
async fn presence_updates_mirror_onto_conversations() {
    let api = InMemoryApi::new()
        .with_conversation(record(json!({ "id": 7, "userId": 7, "username": "ana" })))
        .with_conversation(record(json!({ "id": 50, "type": "group", "name": "crew" })));
    let (client, conn, mut events) = connect_with(api).await;
    assert_eq!(client.conversations().len(), 2);

    conn.send_json(&json!({ "type": "user_online", "userId": 7 }));
    settle().await;
    assert!(client.conversation(ConversationId::new(7)).unwrap().online);
    assert!(!client.conversation(ConversationId::new(50)).unwrap().online);
    assert_eq!(client.online_users(), vec![UserId::new(7)]);

    // Repeating an unchanged presence emits nothing.
    drain(&mut events);
    conn.send_json(&json!({ "type": "user_online", "user_id": 7 }));
    settle().await;
    assert!(drain(&mut events).is_empty());

    conn.send_json(&json!({ "type": "user_offline", "id": 7 }));
    settle().await;
    assert!(!client.conversation(ConversationId::new(7)).unwrap().online);
    assert!(client.online_users().is_empty());
}

#[tokio::test(start_paused = true)]
async fn server_error_frame_is_surfaced() {
    let (client, conn, mut events) = connect().await;

    conn.send_json(&json!({ "type": "error", "message": "rate limited" }));
    settle().await;

    let status = client.connection();
    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.last_error.as_deref(), Some("rate limited"));
    assert_eq!(
        drain(&mut events),
        vec![ClientEvent::Error("rate limited".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn message_receipt_advances_single_message() {
    let (client, conn, _events) = connect().await;
    conn.send_json(&json!({
        "type": "private_message", "id": "a", "from": 2, "to": 1, "content": "one"
    }));
    conn.send_json(&json!({
        "type": "private_message", "id": "b", "from": 2, "to": 1, "content": "two"
    }));
    conn.send_json(&json!({ "type": "message_read", "messageId": "b" }));
    settle().await;

    let statuses: Vec<_> = client
        .messages(ConversationId::new(2))
        .iter()
        .map(|m| m.status)
        .collect();
    assert_eq!(statuses, vec![MessageStatus::Delivered, MessageStatus::Read]);
}

#[tokio::test(start_paused = true)]
async fn conversation_list_loads_on_start() {
    let api = InMemoryApi::new()
        .with_conversation(record(json!({
            "id": 7, "userId": 7, "lastMessage": "older",
            "lastMessageTime": "2024-05-01T10:00:00Z", "unreadCount": 2
        })))
        .with_conversation(record(json!({
            "id": 8, "userId": 8, "lastMessage": "newer",
            "lastMessageTime": "2024-05-02T10:00:00Z"
        })));
    let (client, _conn, _events) = connect_with(api).await;

    let ids: Vec<_> = client.conversations().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![ConversationId::new(8), ConversationId::new(7)]);
    assert_eq!(client.conversation(ConversationId::new(7)).unwrap().unread, 2);
}

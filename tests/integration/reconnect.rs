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

//! Integration tests for connection lifecycle: backoff, retry classification,
//! attempt bookkeeping, intentional closes and superseded connections.
//!
//! All tests run on a paused Tokio clock, so backoff delays of tens of
//! seconds complete instantly while keeping their exact ordering.

use std::time::Duration;

use tokio::sync::mpsc;

use ripple::api::InMemoryApi;
use ripple::client::{ClientEvent, ClientSettings, ConnectionState, RealtimeClient};
use ripple::transport::Outgoing;
use ripple::transport::loopback::{LoopbackConnector, LoopbackServer, ServerConn};
use ripple_proto::message::{ConversationId, UserId};

const ME: UserId = UserId::new(1);

type Client = RealtimeClient<LoopbackConnector, InMemoryApi>;

struct Harness {
    client: Client,
    server: LoopbackServer,
    events: mpsc::Receiver<ClientEvent>,
}

fn harness_with(settings: ClientSettings) -> Harness {
    let (connector, server) = LoopbackConnector::create();
    let (client, events) = RealtimeClient::new(settings, connector, InMemoryApi::new());
    Harness {
        client,
        server,
        events,
    }
}

fn harness() -> Harness {
    harness_with(ClientSettings::new("ws://chat.test/ws", ME))
}

/// Let spawned tasks run without letting the backoff clock move noticeably.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn connected() -> (Harness, ServerConn) {
    let mut h = harness();
    h.client.start();
    settle().await;
    let conn = h.server.try_accept().expect("client should have connected");
    assert_eq!(h.client.connection().state, ConnectionState::Open);
    (h, conn)
}

fn drain(events: &mut mpsc::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

fn scheduled_delays(events: &[ClientEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::ReconnectScheduled { delay, .. } => {
                Some(u64::try_from(delay.as_millis()).unwrap())
            }
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn start_connects_once_and_is_idempotent() {
    let mut h = harness();
    h.client.start();
    h.client.start();
    settle().await;
    h.client.start();
    settle().await;

    assert_eq!(h.server.attempts(), 1);
    assert!(h.server.try_accept().is_some());
    assert!(h.server.try_accept().is_none());
    assert_eq!(h.server.last_url().as_deref(), Some("ws://chat.test/ws"));

    let status = h.client.connection();
    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.attempts, 0);
    assert!(status.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn retryable_close_codes_schedule_reconnect() {
    for code in [1002u16, 1005, 1006, 1011, 4000] {
        let (mut h, conn) = connected().await;
        drain(&mut h.events);

        conn.close(code, "gone");
        settle().await;
        assert_eq!(h.client.connection().state, ConnectionState::Closed);
        let events = drain(&mut h.events);
        assert!(
            events.contains(&ClientEvent::ReconnectScheduled {
                attempt: 1,
                delay: Duration::from_secs(1),
            }),
            "code {code} should schedule a retry, got {events:?}"
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert!(h.server.try_accept().is_some(), "code {code} did not reconnect");
        assert_eq!(h.client.connection().state, ConnectionState::Open);
    }
}

#[tokio::test(start_paused = true)]
async fn normal_and_going_away_closes_are_final() {
    for code in [1000u16, 1001] {
        let (mut h, conn) = connected().await;
        drain(&mut h.events);

        conn.close(code, "bye");
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(h.server.attempts(), 1, "code {code} must not retry");
        assert_eq!(h.client.connection().state, ConnectionState::Closed);
        assert!(scheduled_delays(&drain(&mut h.events)).is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn first_retry_waits_exactly_the_base_delay() {
    let (h, conn) = connected().await;
    conn.close(1006, "");
    settle().await;

    tokio::time::sleep(Duration::from_millis(990)).await;
    assert_eq!(h.server.attempts(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.server.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_and_gives_up_after_five_attempts() {
    let (mut h, conn) = connected().await;
    drain(&mut h.events);
    h.server.refuse_next(100);

    conn.close(1006, "");
    tokio::time::sleep(Duration::from_secs(120)).await;

    let events = drain(&mut h.events);
    assert_eq!(scheduled_delays(&events), vec![1000, 2000, 4000, 8000, 16_000]);
    assert!(events.contains(&ClientEvent::ReconnectExhausted { attempts: 5 }));
    // One initial connect plus five retries.
    assert_eq!(h.server.attempts(), 6);

    let status = h.client.connection();
    assert_eq!(status.state, ConnectionState::Closed);
    assert_eq!(status.attempts, 5);
    assert!(status.exhausted);
    assert!(status.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn delays_are_capped() {
    let mut settings = ClientSettings::new("ws://chat.test/ws", ME);
    settings.reconnect.max_attempts = 8;
    let mut h = harness_with(settings);
    h.client.start();
    settle().await;
    let conn = h.server.try_accept().unwrap();
    drain(&mut h.events);
    h.server.refuse_next(100);

    conn.close(1011, "server restart");
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(
        scheduled_delays(&drain(&mut h.events)),
        vec![1000, 2000, 4000, 8000, 16_000, 30_000, 30_000, 30_000]
    );
}

#[tokio::test(start_paused = true)]
async fn attempt_counter_runs_one_two_then_resets_on_open() {
    let (mut h, conn) = connected().await;
    drain(&mut h.events);
    h.server.refuse_next(1);

    conn.close(1006, "");
    tokio::time::sleep(Duration::from_secs(10)).await;

    let sequence: Vec<u32> = drain(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::ConnectionChanged {
                state: ConnectionState::Connecting | ConnectionState::Open,
                attempts,
            } => Some(attempts),
            _ => None,
        })
        .collect();
    assert_eq!(sequence, vec![1, 2, 0]);

    let status = h.client.connection();
    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.attempts, 0);
    assert!(
        status.last_error.is_none(),
        "open must clear the connect error"
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let (h, conn) = connected().await;
    conn.close(1006, "");
    settle().await;

    h.client.disconnect(1000, "user left");
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.server.attempts(), 1);
    assert_eq!(h.client.connection().state, ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn close_after_disconnect_is_never_retried() {
    let (h, mut conn) = connected().await;

    h.client.disconnect(1000, "bye");
    assert_eq!(h.client.connection().state, ConnectionState::Closing);
    assert_eq!(
        conn.recv().await,
        Some(Outgoing::Close {
            code: 1000,
            reason: "bye".to_string()
        })
    );

    // Even an abnormal code is final once the close was requested.
    conn.close(1006, "");
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.client.connection().state, ConnectionState::Closed);
    assert_eq!(h.server.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn reconnect_recovers_from_exhaustion() {
    let (mut h, conn) = connected().await;
    h.server.refuse_next(5);
    conn.close(1006, "");
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(h.client.connection().exhausted);
    drain(&mut h.events);

    h.client.reconnect();
    let status = h.client.connection();
    assert_eq!(status.state, ConnectionState::Connecting);
    assert_eq!(status.attempts, 0);
    assert!(status.last_error.is_none());
    assert!(!status.exhausted);

    settle().await;
    assert!(h.server.try_accept().is_some());
    assert_eq!(h.client.connection().state, ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn superseded_connection_cannot_touch_state() {
    let (mut h, mut old) = connected().await;

    h.client.reconnect();
    settle().await;
    let fresh = h.server.try_accept().expect("reconnect should open a new link");
    assert!(matches!(
        old.recv().await,
        Some(Outgoing::Close { code: 1000, .. })
    ));

    old.send_json(&serde_json::json!({
        "type": "private_message", "id": 1, "from": 2, "to": 1, "content": "ghost"
    }));
    old.close(1006, "");
    settle().await;

    assert!(h.client.messages(ConversationId::new(2)).is_empty());
    assert_eq!(h.client.connection().state, ConnectionState::Open);

    fresh.send_json(&serde_json::json!({
        "type": "private_message", "id": 2, "from": 2, "to": 1, "content": "live"
    }));
    settle().await;
    let messages = h.client.messages(ConversationId::new(2));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "live");
}

#[tokio::test(start_paused = true)]
async fn transport_error_is_recorded_but_connection_stays_open() {
    let (mut h, conn) = connected().await;
    drain(&mut h.events);

    conn.error("tls alert");
    settle().await;

    let status = h.client.connection();
    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.last_error.as_deref(), Some("tls alert"));
    assert!(drain(&mut h.events).contains(&ClientEvent::Error("tls alert".to_string())));
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_timers_and_ignores_later_calls() {
    let (h, conn) = connected().await;
    conn.close(1006, "");
    settle().await;

    h.client.shutdown();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.server.attempts(), 1);

    h.client.start();
    h.client.reconnect();
    settle().await;
    assert_eq!(h.server.attempts(), 1);
    assert_eq!(h.client.connection().state, ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn dropping_last_handle_closes_the_link() {
    let (h, mut conn) = connected().await;
    let extra = h.client.clone();

    drop(h.client);
    settle().await;
    assert!(conn.drain().is_empty());

    drop(extra);
    assert!(matches!(
        conn.recv().await,
        Some(Outgoing::Close { code: 1000, .. })
    ));
}

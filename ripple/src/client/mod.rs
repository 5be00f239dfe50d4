//! Realtime connection manager.
//!
//! [`RealtimeClient`] owns one connection to the realtime endpoint at a time,
//! reconnects with capped exponential backoff after unintentional closes,
//! dispatches inbound frames into a [`ChatState`], and debounces typing
//! indicators. Callers drive it through non-blocking operations and observe
//! it through [`ClientEvent`]s and snapshot accessors.
//!
//! # Concurrency
//!
//! All mutable state sits behind one `parking_lot` mutex. Caller operations,
//! the connection task, the reconnect timer and typing timers each take the
//! lock for a short synchronous section and never hold it across an
//! `.await`, so mutations are applied one at a time in arrival order.
//!
//! Every connection attempt gets a new generation number. Events carrying an
//! older generation come from a superseded connection and are discarded.

pub mod backoff;
mod dispatch;
mod send;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use ripple_proto::codec::CodecError;
use ripple_proto::message::{ChatKind, ConversationId, MessageId, MessageStatus, UserId};
use ripple_proto::record::{ConversationRecord, MessageRecord};

use crate::api::{ApiError, ChatApi};
use crate::chat::typing::TypingTracker;
use crate::chat::{ChatState, Conversation, Message};
use crate::transport::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, Connector, LinkEvent, Outgoing, TransportError,
    is_retryable_close,
};

pub use backoff::ReconnectPolicy;

/// Default quiet interval after which a typing indicator disappears.
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Default capacity of the client event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Lifecycle state of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    Connecting,
    /// The connection is open and frames can be sent.
    Open,
    /// A close was requested and is being acknowledged.
    Closing,
    /// No connection.
    #[default]
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Snapshot of the connection as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Reconnect attempts made since the last successful open.
    pub attempts: u32,
    /// Most recent connection-level error, cleared by a successful open.
    pub last_error: Option<String>,
    /// `true` once reconnect attempts are exhausted; cleared by `reconnect()`.
    pub exhausted: bool,
}

/// Settings for a [`RealtimeClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Realtime endpoint URL.
    pub realtime_url: String,
    /// The authenticated user this client acts as.
    pub local_user: UserId,
    /// Reconnect backoff policy.
    pub reconnect: ReconnectPolicy,
    /// Quiet interval after which typing indicators expire.
    pub typing_timeout: Duration,
    /// Capacity of the [`ClientEvent`] channel.
    pub event_buffer: usize,
}

impl ClientSettings {
    /// Settings with default policy values.
    pub fn new(realtime_url: impl Into<String>, local_user: UserId) -> Self {
        Self {
            realtime_url: realtime_url.into(),
            local_user,
            reconnect: ReconnectPolicy::default(),
            typing_timeout: DEFAULT_TYPING_TIMEOUT,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Notifications emitted by the client.
///
/// Events are delivered with `try_send`; if the receiver falls behind, events
/// are dropped. The snapshot accessors always reflect the latest state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The connection moved to a new state.
    ConnectionChanged {
        /// New state.
        state: ConnectionState,
        /// Reconnect attempts made so far.
        attempts: u32,
    },
    /// A reconnect attempt was scheduled.
    ReconnectScheduled {
        /// Which attempt this will be (1-based).
        attempt: u32,
        /// How long until it starts.
        delay: Duration,
    },
    /// Reconnect attempts are exhausted; only `reconnect()` recovers.
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
    },
    /// A non-fatal error (transport, server or REST).
    Error(String),
    /// The conversation list was loaded from the REST API.
    ConversationsLoaded {
        /// Number of conversations received.
        count: usize,
    },
    /// A conversation's history was loaded from the REST API.
    HistoryLoaded {
        /// The conversation.
        conversation: ConversationId,
        /// Messages added by the load.
        count: usize,
    },
    /// Conversation metadata changed (unread count, preview, selection).
    ConversationUpdated(ConversationId),
    /// A message was appended.
    MessageAdded(Message),
    /// An optimistic message was matched with the server's copy.
    MessageReconciled {
        /// The conversation.
        conversation: ConversationId,
        /// The temporary id the message had.
        local_id: MessageId,
        /// The message as now stored.
        message: Message,
    },
    /// A message's delivery status moved forward.
    StatusChanged {
        /// The conversation.
        conversation: ConversationId,
        /// The message.
        message_id: MessageId,
        /// New status.
        status: MessageStatus,
    },
    /// The set of typing users in a conversation changed.
    TypingChanged {
        /// The conversation.
        conversation: ConversationId,
        /// Users now typing, in id order.
        users: Vec<UserId>,
    },
    /// The online user set changed.
    PresenceChanged {
        /// Users now online, in id order.
        online: Vec<UserId>,
    },
}

/// Errors returned to callers of [`RealtimeClient`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No open connection; the message was not sent or queued.
    #[error("not connected")]
    NotConnected,

    /// The message has no visible content.
    #[error("message is empty")]
    EmptyMessage,

    /// The outbound frame could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Connection bookkeeping.
#[derive(Debug, Default)]
struct ConnectionSlot {
    state: ConnectionState,
    generation: u64,
    attempts: u32,
    last_error: Option<String>,
    exhausted: bool,
    /// Set by `disconnect()`; the next close is never retried.
    closing_intentionally: bool,
    /// Outbound queue of the open connection.
    outbound: Option<mpsc::UnboundedSender<Outgoing>>,
    /// Task driving the current connection.
    pump: Option<AbortHandle>,
    reconnect_timer: Option<AbortHandle>,
}

impl ConnectionSlot {
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            attempts: self.attempts,
            last_error: self.last_error.clone(),
            exhausted: self.exhausted,
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    /// Forget the current connection so nothing it reports is applied.
    fn supersede(&mut self) {
        self.generation += 1;
        self.outbound = None;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

struct Shared {
    conn: ConnectionSlot,
    chat: ChatState,
    typing: TypingTracker,
    history_pending: HashSet<ConversationId>,
    loaders: Vec<AbortHandle>,
    conversations_requested: bool,
    shut_down: bool,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        !self.shut_down && self.conn.generation == generation
    }

    fn track(&mut self, task: AbortHandle) {
        self.loaders.retain(|t| !t.is_finished());
        self.loaders.push(task);
    }
}

struct Inner<C: Connector, A: ChatApi> {
    settings: ClientSettings,
    connector: C,
    api: A,
    shared: Mutex<Shared>,
    events: mpsc::Sender<ClientEvent>,
}

/// Shuts the client down when the last [`RealtimeClient`] clone is dropped.
struct ClientHandle<C: Connector, A: ChatApi> {
    inner: Arc<Inner<C, A>>,
}

impl<C: Connector, A: ChatApi> Drop for ClientHandle<C, A> {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

/// Handle to the realtime connection manager. Cheap to clone.
///
/// Operations that start background work ([`start`](Self::start),
/// [`reconnect`](Self::reconnect), [`select_conversation`](Self::select_conversation))
/// spawn tasks and therefore must be called from within a Tokio runtime.
pub struct RealtimeClient<C: Connector, A: ChatApi> {
    handle: Arc<ClientHandle<C, A>>,
}

impl<C: Connector, A: ChatApi> Clone for RealtimeClient<C, A> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<C: Connector, A: ChatApi> RealtimeClient<C, A> {
    /// Create a client. Nothing happens until [`start`](Self::start).
    ///
    /// Returns the client and the receiver for its [`ClientEvent`]s.
    pub fn new(
        settings: ClientSettings,
        connector: C,
        api: A,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (events, event_rx) = mpsc::channel(settings.event_buffer.max(1));
        let shared = Shared {
            conn: ConnectionSlot::default(),
            chat: ChatState::new(settings.local_user),
            typing: TypingTracker::new(),
            history_pending: HashSet::new(),
            loaders: Vec::new(),
            conversations_requested: false,
            shut_down: false,
        };
        let inner = Arc::new(Inner {
            settings,
            connector,
            api,
            shared: Mutex::new(shared),
            events,
        });
        (
            Self {
                handle: Arc::new(ClientHandle { inner }),
            },
            event_rx,
        )
    }

    fn inner(&self) -> &Arc<Inner<C, A>> {
        &self.handle.inner
    }

    /// Open the connection and start loading the conversation list.
    ///
    /// Does nothing while a connection is connecting, open or closing. From
    /// `Closed` (including after reconnects were exhausted) it connects with
    /// a fresh attempt counter.
    pub fn start(&self) {
        self.inner().start();
    }

    /// Send a chat message to `conversation`.
    ///
    /// The frame is queued on the open connection and an optimistic message
    /// with status [`MessageStatus::Sending`] is appended. Returns the
    /// temporary id of that message.
    ///
    /// # Errors
    ///
    /// - [`ClientError::EmptyMessage`] if `content` is blank.
    /// - [`ClientError::NotConnected`] if the connection is not open. Nothing
    ///   is queued and no state changes.
    /// - [`ClientError::Codec`] if the frame cannot be encoded.
    pub fn send_message(
        &self,
        conversation: ConversationId,
        content: impl Into<String>,
        kind: ChatKind,
    ) -> Result<MessageId, ClientError> {
        self.inner().send_message(conversation, content.into(), kind)
    }

    /// Tell `conversation` whether the local user is typing.
    ///
    /// Best effort: silently does nothing when not connected.
    pub fn send_typing_indicator(&self, conversation: ConversationId, is_typing: bool) {
        self.inner().send_typing_indicator(conversation, is_typing);
    }

    /// Make `conversation` the active one, clear its unread count and load
    /// its history if it has not been loaded yet.
    pub fn select_conversation(&self, conversation: ConversationId) {
        self.inner().select_conversation(conversation);
    }

    /// Close the connection intentionally. No reconnect follows.
    ///
    /// Cancels the pending reconnect timer and every typing timer.
    pub fn disconnect(&self, code: u16, reason: &str) {
        self.inner().disconnect(code, reason);
    }

    /// Drop any current connection and connect again with a fresh attempt
    /// counter and no recorded error.
    pub fn reconnect(&self) {
        self.inner().reconnect();
    }

    /// Close the connection and stop every background task.
    ///
    /// Later operations are ignored. Also runs when the last clone of the
    /// client is dropped.
    pub fn shutdown(&self) {
        self.inner().shutdown();
    }

    /// Connection state, attempt counter and last error.
    #[must_use]
    pub fn connection(&self) -> ConnectionStatus {
        self.inner().shared.lock().conn.status()
    }

    /// All conversations, most recently active first.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        self.inner().shared.lock().chat.conversations()
    }

    /// One conversation.
    #[must_use]
    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.inner().shared.lock().chat.conversation(id).cloned()
    }

    /// Messages of a conversation in arrival order.
    #[must_use]
    pub fn messages(&self, id: ConversationId) -> Vec<Message> {
        self.inner().shared.lock().chat.messages(id).to_vec()
    }

    /// Users currently online.
    #[must_use]
    pub fn online_users(&self) -> Vec<UserId> {
        self.inner().shared.lock().chat.online_users()
    }

    /// Users currently typing in a conversation.
    #[must_use]
    pub fn typing_users(&self, id: ConversationId) -> Vec<UserId> {
        self.inner().shared.lock().typing.users(id)
    }

    /// The selected conversation.
    #[must_use]
    pub fn selected_conversation(&self) -> Option<ConversationId> {
        self.inner().shared.lock().chat.selected()
    }

    /// The authenticated user.
    #[must_use]
    pub fn local_user(&self) -> UserId {
        self.inner().settings.local_user
    }
}

impl<C: Connector, A: ChatApi> Inner<C, A> {
    fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.events.try_send(event) {
            tracing::debug!(err = %e, "client event dropped");
        }
    }

    fn start(self: &Arc<Self>) {
        let mut shared = self.shared.lock();
        if shared.shut_down {
            tracing::warn!("start ignored: client is shut down");
            return;
        }

        if shared.conn.state == ConnectionState::Closed {
            shared.conn.cancel_reconnect();
            shared.conn.attempts = 0;
            shared.conn.exhausted = false;
            self.open_connection(&mut shared);
        } else {
            tracing::debug!(state = %shared.conn.state, "start ignored: connection active");
        }

        if !shared.conversations_requested {
            shared.conversations_requested = true;
            self.spawn_conversation_load(&mut shared);
        }
    }

    fn open_connection(self: &Arc<Self>, shared: &mut Shared) {
        shared.conn.supersede();
        shared.conn.state = ConnectionState::Connecting;
        shared.conn.closing_intentionally = false;

        let generation = shared.conn.generation;
        let attempts = shared.conn.attempts;
        tracing::info!(
            url = %self.settings.realtime_url,
            attempt = attempts,
            generation,
            "connecting"
        );
        self.emit(ClientEvent::ConnectionChanged {
            state: ConnectionState::Connecting,
            attempts,
        });

        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.run_connection(generation).await });
        shared.conn.pump = Some(task.abort_handle());
    }

    /// Drive one connection from connect to close.
    async fn run_connection(self: Arc<Self>, generation: u64) {
        let mut link = match self.connector.connect(&self.settings.realtime_url).await {
            Ok(link) => link,
            Err(e) => {
                self.on_connect_failed(generation, &e);
                return;
            }
        };

        if !self.on_open(generation, link.sender()) {
            return;
        }

        while let Some(event) = link.recv().await {
            match event {
                LinkEvent::Text(text) => self.on_frame(generation, &text),
                LinkEvent::Error(message) => self.on_transport_error(generation, message),
                LinkEvent::Closed { code, reason } => {
                    self.on_close(generation, code, &reason);
                    return;
                }
            }
        }
        self.on_close(generation, CLOSE_ABNORMAL, "transport dropped");
    }

    fn on_open(&self, generation: u64, outbound: mpsc::UnboundedSender<Outgoing>) -> bool {
        let mut shared = self.shared.lock();
        if !shared.is_current(generation) {
            tracing::debug!(generation, "superseded connection opened, dropping it");
            return false;
        }

        let conn = &mut shared.conn;
        conn.state = ConnectionState::Open;
        conn.attempts = 0;
        conn.last_error = None;
        conn.exhausted = false;
        conn.outbound = Some(outbound);
        tracing::info!(generation, "realtime connection open");
        self.emit(ClientEvent::ConnectionChanged {
            state: ConnectionState::Open,
            attempts: 0,
        });
        true
    }

    fn on_connect_failed(self: &Arc<Self>, generation: u64, err: &TransportError) {
        let mut shared = self.shared.lock();
        if !shared.is_current(generation) {
            return;
        }
        tracing::warn!(err = %err, attempt = shared.conn.attempts, "connect failed");
        let message = err.to_string();
        shared.conn.last_error = Some(message.clone());
        self.emit(ClientEvent::Error(message));
        self.handle_closed(&mut shared, CLOSE_ABNORMAL, "connect failed");
    }

    fn on_transport_error(&self, generation: u64, message: String) {
        let mut shared = self.shared.lock();
        if !shared.is_current(generation) {
            return;
        }
        tracing::warn!(err = %message, "transport error");
        shared.conn.last_error = Some(message.clone());
        self.emit(ClientEvent::Error(message));
    }

    fn on_close(self: &Arc<Self>, generation: u64, code: u16, reason: &str) {
        let mut shared = self.shared.lock();
        if !shared.is_current(generation) {
            tracing::debug!(generation, code, "close from superseded connection ignored");
            return;
        }
        self.handle_closed(&mut shared, code, reason);
    }

    fn handle_closed(self: &Arc<Self>, shared: &mut Shared, code: u16, reason: &str) {
        let conn = &mut shared.conn;
        conn.outbound = None;
        conn.pump = None;
        conn.state = ConnectionState::Closed;
        let intentional = conn.closing_intentionally || !is_retryable_close(code);
        self.emit(ClientEvent::ConnectionChanged {
            state: ConnectionState::Closed,
            attempts: conn.attempts,
        });

        if intentional {
            tracing::info!(code, reason, "connection closed");
            return;
        }
        tracing::warn!(code, reason, "connection lost");
        self.schedule_reconnect(shared);
    }

    fn schedule_reconnect(self: &Arc<Self>, shared: &mut Shared) {
        let attempts = shared.conn.attempts;
        let policy = self.settings.reconnect;
        if !policy.allows(attempts) {
            let message = format!("unable to reconnect after {attempts} attempts");
            tracing::error!(attempts, "reconnect attempts exhausted");
            shared.conn.exhausted = true;
            shared.conn.last_error = Some(message.clone());
            self.emit(ClientEvent::ReconnectExhausted { attempts });
            self.emit(ClientEvent::Error(message));
            return;
        }

        let delay = policy.delay_for(attempts);
        let generation = shared.conn.generation;
        tracing::info!(
            attempt = attempts + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );
        self.emit(ClientEvent::ReconnectScheduled {
            attempt: attempts + 1,
            delay,
        });

        let this = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.on_reconnect_due(generation);
        });
        shared.conn.cancel_reconnect();
        shared.conn.reconnect_timer = Some(timer.abort_handle());
    }

    fn on_reconnect_due(self: &Arc<Self>, generation: u64) {
        let mut shared = self.shared.lock();
        if !shared.is_current(generation) || shared.conn.state != ConnectionState::Closed {
            tracing::debug!(generation, "stale reconnect timer ignored");
            return;
        }
        shared.conn.reconnect_timer = None;
        shared.conn.attempts += 1;
        self.open_connection(&mut shared);
    }

    fn disconnect(&self, code: u16, reason: &str) {
        let mut shared = self.shared.lock();
        shared.conn.cancel_reconnect();
        self.clear_typing(&mut shared);
        shared.conn.closing_intentionally = true;

        let close = Outgoing::Close {
            code,
            reason: reason.to_string(),
        };
        let sent = shared
            .conn
            .outbound
            .take()
            .is_some_and(|outbound| outbound.send(close).is_ok());

        if sent {
            tracing::info!(code, reason, "closing connection");
            shared.conn.state = ConnectionState::Closing;
            self.emit(ClientEvent::ConnectionChanged {
                state: ConnectionState::Closing,
                attempts: shared.conn.attempts,
            });
        } else {
            shared.conn.supersede();
            if shared.conn.state != ConnectionState::Closed {
                tracing::info!(code, reason, "connection abandoned");
                shared.conn.state = ConnectionState::Closed;
                self.emit(ClientEvent::ConnectionChanged {
                    state: ConnectionState::Closed,
                    attempts: shared.conn.attempts,
                });
            }
        }
    }

    fn reconnect(self: &Arc<Self>) {
        let mut shared = self.shared.lock();
        if shared.shut_down {
            tracing::warn!("reconnect ignored: client is shut down");
            return;
        }

        shared.conn.cancel_reconnect();
        if let Some(outbound) = shared.conn.outbound.take() {
            let _ = outbound.send(Outgoing::Close {
                code: CLOSE_NORMAL,
                reason: "reconnecting".to_string(),
            });
        }
        shared.conn.attempts = 0;
        shared.conn.last_error = None;
        shared.conn.exhausted = false;
        tracing::info!("manual reconnect");
        self.open_connection(&mut shared);
    }

    fn shutdown(&self) {
        let mut shared = self.shared.lock();
        if shared.shut_down {
            return;
        }
        shared.shut_down = true;

        shared.conn.cancel_reconnect();
        shared.conn.closing_intentionally = true;
        self.clear_typing(&mut shared);
        for task in shared.loaders.drain(..) {
            task.abort();
        }
        if let Some(outbound) = shared.conn.outbound.take() {
            let _ = outbound.send(Outgoing::Close {
                code: CLOSE_NORMAL,
                reason: "client shutdown".to_string(),
            });
        }
        shared.conn.supersede();
        if shared.conn.state != ConnectionState::Closed {
            shared.conn.state = ConnectionState::Closed;
            self.emit(ClientEvent::ConnectionChanged {
                state: ConnectionState::Closed,
                attempts: shared.conn.attempts,
            });
        }
        tracing::info!("realtime client shut down");
    }

    fn clear_typing(&self, shared: &mut Shared) {
        for conversation in shared.typing.cancel_all() {
            self.emit(ClientEvent::TypingChanged {
                conversation,
                users: Vec::new(),
            });
        }
    }

    fn spawn_conversation_load(self: &Arc<Self>, shared: &mut Shared) {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = this.api.fetch_conversations().await;
            this.on_conversations_fetched(result);
        });
        shared.track(task.abort_handle());
    }

    fn on_conversations_fetched(&self, result: Result<Vec<ConversationRecord>, ApiError>) {
        let mut shared = self.shared.lock();
        if shared.shut_down {
            return;
        }
        match result {
            Ok(records) => {
                let count = shared.chat.load_conversations(&records);
                tracing::info!(count, "conversation list loaded");
                self.emit(ClientEvent::ConversationsLoaded { count });
            }
            Err(e) => {
                tracing::warn!(err = %e, "failed to load conversations");
                shared.conversations_requested = false;
                self.emit(ClientEvent::Error(format!(
                    "failed to load conversations: {e}"
                )));
            }
        }
    }

    fn select_conversation(self: &Arc<Self>, conversation: ConversationId) {
        let mut shared = self.shared.lock();
        if shared.shut_down {
            return;
        }
        shared.chat.select(conversation);
        self.emit(ClientEvent::ConversationUpdated(conversation));

        if shared.chat.needs_history(conversation) && shared.history_pending.insert(conversation) {
            let this = Arc::clone(self);
            let task = tokio::spawn(async move {
                let result = this.api.fetch_messages(conversation).await;
                this.on_history_fetched(conversation, result);
            });
            shared.track(task.abort_handle());
        }
    }

    fn on_history_fetched(
        &self,
        conversation: ConversationId,
        result: Result<Vec<MessageRecord>, ApiError>,
    ) {
        let mut shared = self.shared.lock();
        shared.history_pending.remove(&conversation);
        if shared.shut_down {
            return;
        }
        match result {
            Ok(records) => {
                let count = shared.chat.load_history(conversation, &records);
                tracing::debug!(%conversation, count, "history loaded");
                self.emit(ClientEvent::HistoryLoaded {
                    conversation,
                    count,
                });
            }
            Err(e) => {
                tracing::warn!(%conversation, err = %e, "failed to load history");
                self.emit(ClientEvent::Error(format!(
                    "failed to load history for {conversation}: {e}"
                )));
            }
        }
    }
}

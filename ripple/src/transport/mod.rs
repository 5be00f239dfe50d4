//! Transport layer abstraction for the realtime client.
//!
//! A [`Connector`] opens a [`Link`]: a pair of channels carrying outbound
//! text frames towards the server and [`LinkEvent`]s back from it. The
//! client never touches sockets directly, so the reconnect state machine can
//! be driven by an in-process transport in tests.
//!
//! Concrete implementations:
//! - [`websocket::WebSocketConnector`]: `tokio-tungstenite` WebSocket client
//! - [`loopback::LoopbackConnector`]: in-process channels for testing

pub mod loopback;
pub mod websocket;

use tokio::sync::mpsc;

/// Close code for a normal, intentional closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code sent when an endpoint is going away (page unload, shutdown).
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Close code reported when a connection drops without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Whether a close with this code should trigger the reconnect algorithm.
///
/// Only `1000` (normal) and `1001` (going away) are treated as intentional.
#[must_use]
pub const fn is_retryable_close(code: u16) -> bool {
    !matches!(code, CLOSE_NORMAL | CLOSE_GOING_AWAY)
}

/// Errors that can occur while establishing a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection attempt did not complete in time.
    #[error("transport operation timed out")]
    Timeout,

    /// The endpoint refused the connection or could not be resolved.
    #[error("endpoint {0} is unreachable")]
    Unreachable(String),

    /// The WebSocket handshake failed (HTTP error, TLS failure, bad URL).
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A frame queued for transmission to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A JSON text frame.
    Text(String),
    /// Close the connection with the given code and reason.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Human-readable close reason.
        reason: String,
    },
}

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// An inbound text frame.
    Text(String),
    /// A non-fatal transport error; the link stays up until `Closed`.
    Error(String),
    /// The link is closed. Always the last event of a link.
    Closed {
        /// WebSocket close code (`1006` when no close frame was received).
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

/// Client side of an open connection.
///
/// Dropping the link drops its outbound sender, which tells the transport
/// to close the underlying connection.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::UnboundedSender<Outgoing>,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Transport side of an open connection.
///
/// Transports drain [`LinkEnd::next_outgoing`] onto the wire and report what
/// they read through [`LinkEnd::emit`].
#[derive(Debug)]
pub struct LinkEnd {
    outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl Link {
    /// Create a connected [`Link`] / [`LinkEnd`] pair.
    #[must_use]
    pub fn channel() -> (Self, LinkEnd) {
        let (outbound, outgoing) = mpsc::unbounded_channel();
        let (events, inbound) = mpsc::unbounded_channel();
        (Self { outbound, inbound }, LinkEnd { outgoing, events })
    }

    /// A cloneable handle for queueing outbound frames.
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<Outgoing> {
        self.outbound.clone()
    }

    /// Wait for the next event. Returns `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.inbound.recv().await
    }
}

impl LinkEnd {
    /// Wait for the next frame the client wants to send.
    ///
    /// Returns `None` once every client-side sender has been dropped.
    pub async fn next_outgoing(&mut self) -> Option<Outgoing> {
        self.outgoing.recv().await
    }

    /// Take the next queued outbound frame without waiting.
    pub fn try_next_outgoing(&mut self) -> Option<Outgoing> {
        self.outgoing.try_recv().ok()
    }

    /// Report an event to the client. Returns `false` if the client is gone.
    pub fn emit(&self, event: LinkEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Split into the outbound receiver and an event sender, so reading and
    /// writing can run on separate tasks.
    #[must_use]
    pub fn split(
        self,
    ) -> (
        mpsc::UnboundedReceiver<Outgoing>,
        mpsc::UnboundedSender<LinkEvent>,
    ) {
        (self.outgoing, self.events)
    }
}

/// Opens connections to the realtime endpoint.
///
/// Implementations must be cheap to call repeatedly: the client calls
/// [`Connector::connect`] once per connection attempt.
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection to `url`.
    ///
    /// Resolves once the connection is open (the equivalent of a browser
    /// WebSocket's `open` event) or has definitively failed.
    fn connect(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Link, TransportError>> + Send;
}

//! Loopback transport for testing.
//!
//! [`LoopbackConnector::create`] returns a connector for the client and a
//! [`LoopbackServer`] for the test. Every successful connect hands the test a
//! [`ServerConn`] through which it plays the server: pushing frames, reading
//! what the client sent, and closing the connection with any code. Connect
//! attempts can be scripted to fail with [`LoopbackServer::refuse_next`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Connector, Link, LinkEnd, LinkEvent, Outgoing, TransportError};

#[derive(Debug, Default)]
struct Shared {
    /// Number of upcoming connect attempts to refuse.
    refusals: Mutex<u32>,
    /// Total connect attempts, including refused ones.
    attempts: AtomicU32,
    /// URL passed to the most recent connect.
    last_url: Mutex<Option<String>>,
}

/// In-process [`Connector`] whose connections are served by a test.
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    accepted: mpsc::UnboundedSender<ServerConn>,
    shared: Arc<Shared>,
}

/// Test-side handle that receives every connection the client opens.
#[derive(Debug)]
pub struct LoopbackServer {
    accepted: mpsc::UnboundedReceiver<ServerConn>,
    shared: Arc<Shared>,
}

/// Server side of one loopback connection.
#[derive(Debug)]
pub struct ServerConn {
    end: LinkEnd,
}

impl LoopbackConnector {
    /// Create a connected connector / server pair.
    #[must_use]
    pub fn create() -> (Self, LoopbackServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        (
            Self {
                accepted: tx,
                shared: Arc::clone(&shared),
            },
            LoopbackServer {
                accepted: rx,
                shared,
            },
        )
    }
}

impl Connector for LoopbackConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        *self.shared.last_url.lock() = Some(url.to_string());

        {
            let mut refusals = self.shared.refusals.lock();
            if *refusals > 0 {
                *refusals -= 1;
                tracing::debug!(url, "loopback connect refused");
                return Err(TransportError::Unreachable(url.to_string()));
            }
        }

        let (link, end) = Link::channel();
        self.accepted
            .send(ServerConn { end })
            .map_err(|_| TransportError::Unreachable(url.to_string()))?;
        Ok(link)
    }
}

impl LoopbackServer {
    /// Wait for the client to open the next connection.
    pub async fn accept(&mut self) -> Option<ServerConn> {
        self.accepted.recv().await
    }

    /// Take an already opened connection without waiting.
    pub fn try_accept(&mut self) -> Option<ServerConn> {
        self.accepted.try_recv().ok()
    }

    /// Make the next `count` connect attempts fail as unreachable.
    pub fn refuse_next(&self, count: u32) {
        *self.shared.refusals.lock() = count;
    }

    /// Total connect attempts seen so far, refused ones included.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// URL passed to the most recent connect attempt.
    #[must_use]
    pub fn last_url(&self) -> Option<String> {
        self.shared.last_url.lock().clone()
    }
}

impl ServerConn {
    /// Push a raw text frame to the client.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.end.emit(LinkEvent::Text(text.into()))
    }

    /// Push a JSON frame to the client.
    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Report a transient transport error to the client.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.end.emit(LinkEvent::Error(message.into()))
    }

    /// Close the connection with `code`.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.end.emit(LinkEvent::Closed {
            code,
            reason: reason.into(),
        })
    }

    /// Wait for the next frame the client sends.
    pub async fn recv(&mut self) -> Option<Outgoing> {
        self.end.next_outgoing().await
    }

    /// Wait for the next text frame and parse it as JSON.
    ///
    /// Returns `None` if the client closes or sends something that is not
    /// JSON text.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        match self.recv().await? {
            Outgoing::Text(text) => serde_json::from_str(&text).ok(),
            Outgoing::Close { .. } => None,
        }
    }

    /// Every frame the client has queued so far.
    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::iter::from_fn(|| self.end.try_next_outgoing()).collect()
    }
}

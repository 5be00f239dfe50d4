//! WebSocket transport built on `tokio-tungstenite`.
//!
//! Each successful [`WebSocketConnector::connect`] splits the socket and
//! spawns two tasks: a writer draining the link's outbound queue onto the
//! socket and a reader turning socket frames into [`LinkEvent`]s. Dropping
//! the client side of the link makes the writer send a close frame.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{CLOSE_ABNORMAL, CLOSE_NORMAL, Connector, Link, LinkEvent, Outgoing, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<WsStream, Message>;

/// Read half of a WebSocket connection.
type WsReader = futures_util::stream::SplitStream<WsStream>;

/// Default timeout for the TCP + WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Close code reported when the server sent a close frame without a code.
const CLOSE_NO_STATUS: u16 = 1005;

/// Opens WebSocket connections (`ws://` or `wss://`).
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Create a connector with the given handshake timeout.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for WebSocketConnector {
    /// Perform the WebSocket handshake and spawn the reader and writer tasks.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Timeout`] if the handshake does not finish in time.
    /// - [`TransportError::Unreachable`] if the endpoint refuses the connection.
    /// - [`TransportError::Handshake`] for HTTP, TLS, or URL failures.
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        let (ws_stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                tracing::warn!(url, "WebSocket connect timed out");
                TransportError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url, err = %e, "WebSocket connect failed");
                map_ws_connect_error(url, e)
            })?;

        tracing::debug!(url, "WebSocket handshake complete");

        let (ws_sender, ws_reader) = ws_stream.split();
        let (link, end) = Link::channel();
        let (outgoing, events) = end.split();

        tokio::spawn(writer_loop(ws_sender, outgoing, events.clone()));
        tokio::spawn(reader_loop(ws_reader, events));

        Ok(link)
    }
}

/// Drain queued frames onto the socket.
///
/// Exits after sending a close frame, on a write error, or once the client
/// drops its side of the link (in which case a normal close is sent).
async fn writer_loop(
    mut ws_sender: WsSender,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    while let Some(frame) = outgoing.recv().await {
        let (message, closing) = match frame {
            Outgoing::Text(text) => (Message::Text(text.into()), false),
            Outgoing::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code: CloseCode::from(code),
                    reason: reason.into(),
                })),
                true,
            ),
        };

        if let Err(e) = ws_sender.send(message).await {
            tracing::warn!(err = %e, "WebSocket write failed");
            let _ = events.send(LinkEvent::Error(format!("write failed: {e}")));
            return;
        }
        if closing {
            tracing::debug!("close frame sent");
            return;
        }
    }

    tracing::debug!("link dropped, closing WebSocket");
    let _ = ws_sender
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::from(CLOSE_NORMAL),
            reason: "client went away".into(),
        })))
        .await;
    let _ = ws_sender.close().await;
}

/// Turn socket frames into [`LinkEvent`]s.
///
/// Binary frames are accepted when they hold valid UTF-8 and dropped
/// otherwise. A stream that ends without a close frame is reported as an
/// abnormal closure.
async fn reader_loop(mut ws_reader: WsReader, events: mpsc::UnboundedSender<LinkEvent>) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if events.send(LinkEvent::Text(text.to_string())).is_err() {
                    return;
                }
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => {
                    if events.send(LinkEvent::Text(text)).is_err() {
                        return;
                    }
                }
                Err(_) => tracing::warn!(len = data.len(), "non-UTF-8 binary frame, skipping"),
            },
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame.map_or_else(
                    || (CLOSE_NO_STATUS, String::new()),
                    |f| (u16::from(f.code), f.reason.to_string()),
                );
                tracing::info!(code, reason = %reason, "WebSocket closed by server");
                let _ = events.send(LinkEvent::Closed { code, reason });
                return;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(err = %e, "WebSocket read error");
                let _ = events.send(LinkEvent::Error(e.to_string()));
                break;
            }
        }
    }

    let _ = events.send(LinkEvent::Closed {
        code: CLOSE_ABNORMAL,
        reason: "connection lost".to_string(),
    });
}

/// Map a `tokio_tungstenite` connection error to a [`TransportError`].
fn map_ws_connect_error(url: &str, err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::AddrNotAvailable
            ) {
                TransportError::Unreachable(url.to_string())
            } else {
                TransportError::Io(io_err)
            }
        }
        WsError::Http(response) => {
            TransportError::Handshake(format!("HTTP status {}", response.status()))
        }
        other => TransportError::Handshake(other.to_string()),
    }
}

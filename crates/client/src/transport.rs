// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the WebSocket channel.
//!
//! A transport opens a [`Channel`]: an outbound queue the session writes
//! text and close requests into, and an event stream carrying inbound text,
//! errors and exactly one final [`ChannelEvent::Closed`]. Payloads are opaque
//! text at this layer.
//!
//! Provides:
//! - [`WebSocketTransport`] for real connections
//! - the [`Transport`] trait so tests can inject an in-memory peer

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// The peer closed without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// The connection dropped without a close handshake.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// How long a requested close waits for the peer's close frame.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The channel is already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A write request from the session to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Start the close handshake.
    Close { code: u16, reason: String },
}

/// Something that happened on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// An inbound text frame.
    Message(String),
    /// The channel failed. Always followed by `Closed`.
    Error(String),
    /// The channel is gone. Always the last event, and always sent, even when
    /// the peer never answers a close request.
    Closed { code: u16, reason: String },
}

/// The session's side of an open channel.
#[derive(Debug)]
pub struct Channel {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// The transport's side of an open channel.
#[derive(Debug)]
pub struct ChannelEnd {
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub events: mpsc::UnboundedSender<ChannelEvent>,
}

impl Channel {
    /// Creates a connected channel and the end a transport drives.
    pub fn pair() -> (Channel, ChannelEnd) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Channel {
                outbound: outbound_tx,
                events: events_rx,
            },
            ChannelEnd {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }
}

/// Transport trait for WebSocket-like channels.
///
/// Opening is attempted once. There is no retry and no reconnect; the
/// caller decides whether to open again.
pub trait Transport: Send + Sync {
    /// Opens a channel to `url`.
    fn open(&self, url: &str) -> Pin<Box<dyn Future<Output = TransportResult<Channel>> + Send + '_>>;
}

/// WebSocket transport implementation using tokio-tungstenite.
///
/// Each opened channel is served by its own pump task. Once a close has been
/// requested the pump waits at most `close_timeout` for the peer's close
/// frame, then drops the socket and reports the requested code.
#[derive(Debug, Clone, Copy)]
pub struct WebSocketTransport {
    close_timeout: Duration,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new() -> Self {
        WebSocketTransport {
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Set how long a requested close waits for the peer.
    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str) -> Pin<Box<dyn Future<Output = TransportResult<Channel>> + Send + '_>> {
        let url = url.to_string();
        let close_timeout = self.close_timeout;
        Box::pin(async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            debug!(%url, "WebSocket open");

            let (channel, end) = Channel::pair();
            tokio::spawn(pump(ws_stream, end, close_timeout));
            Ok(channel)
        })
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Moves frames between the socket and the channel until either side ends.
async fn pump(ws: WsStream, mut end: ChannelEnd, close_timeout: Duration) {
    let (mut sink, mut stream) = ws.split();
    // Close we asked for, reported if the peer does not send its own code.
    let mut requested: Option<(u16, String)> = None;
    // Set together with `requested`.
    let mut close_deadline: Option<Instant> = None;
    let mut outbound_open = true;

    let (code, reason) = loop {
        tokio::select! {
            out = end.outbound.recv(), if outbound_open => match out {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        warn!(error = %e, "WebSocket send failed");
                        let _ = end.events.send(ChannelEvent::Error(e.to_string()));
                        break (CLOSE_ABNORMAL, e.to_string());
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    if requested.is_some() {
                        continue;
                    }
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    let sent = sink.send(Message::Close(Some(frame))).await;
                    if let Err(e) = sent {
                        debug!(error = %e, "Close frame not sent");
                        break (code, reason);
                    }
                    requested = Some((code, reason));
                    close_deadline = Some(Instant::now() + close_timeout);
                }
                None => {
                    // Session dropped its sender without asking to close.
                    outbound_open = false;
                    if requested.is_none() {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: String::new().into(),
                        };
                        let _ = sink.send(Message::Close(Some(frame))).await;
                        requested = Some((CLOSE_NORMAL, String::new()));
                        close_deadline = Some(Instant::now() + close_timeout);
                    }
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_owned();
                    let _ = end.events.send(ChannelEvent::Message(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_owned()),
                        None => requested
                            .take()
                            .unwrap_or_else(|| (CLOSE_NO_STATUS, String::new())),
                    };
                }
                Some(Ok(_)) => {
                    // Ping, pong and binary frames carry nothing for us.
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket receive failed");
                    let _ = end.events.send(ChannelEvent::Error(e.to_string()));
                    break (CLOSE_ABNORMAL, e.to_string());
                }
                None => {
                    break requested
                        .take()
                        .unwrap_or_else(|| (CLOSE_ABNORMAL, String::new()));
                }
            },
            _ = tokio::time::sleep_until(close_deadline.unwrap_or_else(Instant::now)),
                if close_deadline.is_some() =>
            {
                debug!(?close_timeout, "Peer did not answer close");
                break requested
                    .take()
                    .unwrap_or_else(|| (CLOSE_NORMAL, String::new()));
            }
        }
    };

    // Flushes the close reply tungstenite queued for the peer.
    if tokio::time::timeout(close_timeout, sink.close()).await.is_err() {
        debug!("Dropping socket with unflushed close");
    }
    debug!(code, %reason, "WebSocket closed");
    let _ = end.events.send(ChannelEvent::Closed { code, reason });
}

//! One WebSocket connection to the game service.
//!
//! [`Connection`] owns the transport exclusively. Protocol-level ping frames
//! are answered by tungstenite on the next read or write and never surface
//! as envelopes. Dropping a connection drops the socket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pong_core::protocol::{self, ClientMessage, ServerMessage};
use pong_core::RetryConfig;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{ConnectError, RecvError, SendError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Limit on a single handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a [`Connection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, or the transport was closed.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Handshake done.
    Connected,
    /// Game in progress.
    Playing,
    /// Connected, between games.
    Idle,
    /// The transport failed.
    Error,
}

impl ConnectionState {
    /// Whether frames may be written in this state.
    pub fn can_send(self) -> bool {
        matches!(self, Self::Connected | Self::Playing | Self::Idle)
    }
}

/// Outcome of [`Connection::receive_with_timeout`].
#[derive(Clone, Debug, PartialEq)]
pub enum Incoming {
    /// A decoded envelope.
    Message(ServerMessage),
    /// Nothing arrived in time.
    Timeout,
}

/// Exclusive owner of one WebSocket.
pub struct Connection {
    url: String,
    ws: Option<WsStream>,
    state: ConnectionState,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open a connection with [`DEFAULT_CONNECT_TIMEOUT`].
    pub async fn connect(url: &str) -> Result<Self, ConnectError> {
        Self::connect_with_timeout(url, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Open a connection, failing if the handshake takes longer than `timeout`.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, ConnectError> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConnectError::InvalidUrl(url.to_owned()));
        }

        let (ws, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| ConnectError::Timeout {
                url: url.to_owned(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })?
            .map_err(|e| ConnectError::Handshake {
                url: url.to_owned(),
                source: Box::new(e),
            })?;

        info!(url, "connected");
        Ok(Self {
            url: url.to_owned(),
            ws: Some(ws),
            state: ConnectionState::Connected,
        })
    }

    /// Open a connection, retrying with exponential backoff.
    ///
    /// Makes up to `retry.attempts()` attempts. Cancellation is honored
    /// between attempts and during the backoff sleep.
    pub async fn connect_with_retry(
        url: &str,
        retry: &RetryConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, ConnectError> {
        let attempts = retry.attempts();
        let mut last = None;

        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                return Err(ConnectError::Cancelled);
            }
            if attempt > 0 {
                let delay = retry.delay_for(attempt - 1);
                debug!(url, attempt, delay_ms = delay.as_millis(), "backing off before reconnect");
                tokio::select! {
                    () = cancel.cancelled() => return Err(ConnectError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }

            let result = tokio::select! {
                () = cancel.cancelled() => return Err(ConnectError::Cancelled),
                result = Self::connect(url) => result,
            };
            match result {
                Ok(conn) => return Ok(conn),
                // A malformed URL will not get better.
                Err(err @ ConnectError::InvalidUrl(_)) => return Err(err),
                Err(err) => {
                    warn!(url, attempt = attempt + 1, attempts, error = %err, "connect attempt failed");
                    last = Some(err);
                }
            }
        }

        Err(ConnectError::Exhausted {
            attempts,
            last: Box::new(last.unwrap_or(ConnectError::Cancelled)),
        })
    }

    /// Endpoint this connection was opened against.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Not closed locally and the peer has not closed or failed.
    pub fn is_open(&self) -> bool {
        self.ws.is_some() && self.state.can_send()
    }

    /// A game started.
    pub fn mark_playing(&mut self) {
        if self.state.can_send() {
            self.state = ConnectionState::Playing;
        }
    }

    /// The game ended but the transport stays up.
    pub fn mark_idle(&mut self) {
        if self.state.can_send() {
            self.state = ConnectionState::Idle;
        }
    }

    /// Write one envelope.
    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), SendError> {
        if !self.state.can_send() {
            return Err(SendError::NotConnected);
        }
        let Some(ws) = self.ws.as_mut() else {
            return Err(SendError::NotConnected);
        };
        if let Err(e) = ws.send(Message::text(message.to_json())).await {
            self.state = ConnectionState::Error;
            return Err(SendError::Transport(Box::new(e)));
        }
        Ok(())
    }

    /// Wait up to `timeout` for the next envelope.
    ///
    /// Control frames do not count as envelopes and do not extend the wait.
    /// A decode failure leaves the connection usable.
    pub async fn receive_with_timeout(&mut self, timeout: Duration) -> Result<Incoming, RecvError> {
        let deadline = Instant::now() + timeout;
        loop {
            let Some(ws) = self.ws.as_mut() else {
                return Err(RecvError::Closed);
            };
            if !self.state.can_send() {
                return Err(RecvError::Closed);
            }

            let Ok(frame) = tokio::time::timeout_at(deadline, ws.next()).await else {
                return Ok(Incoming::Timeout);
            };

            match frame {
                None | Some(Ok(Message::Close(_))) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(RecvError::Closed);
                }
                Some(Err(e)) => {
                    self.state = ConnectionState::Error;
                    return Err(RecvError::Transport(Box::new(e)));
                }
                Some(Ok(Message::Text(text))) => {
                    return protocol::decode_server(text.as_str())
                        .map(Incoming::Message)
                        .map_err(RecvError::from);
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return protocol::decode_bytes::<ServerMessage>(&bytes)
                        .map(Incoming::Message)
                        .map_err(RecvError::from);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            }
        }
    }

    /// Close the transport. Safe to call more than once.
    pub async fn close(&mut self) {
        let Some(mut ws) = self.ws.take() else {
            return;
        };
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await;
        self.state = ConnectionState::Disconnected;
        info!(url = %self.url, "disconnected");
    }
}

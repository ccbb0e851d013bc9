//! Agent error types.

use pong_core::DecodeError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failure to open a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Endpoint is not a `ws://` or `wss://` URL.
    #[error("invalid endpoint `{0}`: expected ws:// or wss://")]
    InvalidUrl(String),
    /// TCP, TLS or WebSocket handshake failed.
    #[error("handshake with {url} failed: {source}")]
    Handshake {
        /// Endpoint.
        url: String,
        /// Underlying error.
        #[source]
        source: Box<tungstenite::Error>,
    },
    /// The handshake did not finish in time.
    #[error("connecting to {url} timed out after {timeout_ms}ms")]
    Timeout {
        /// Endpoint.
        url: String,
        /// Limit that was exceeded.
        timeout_ms: u64,
    },
    /// Every attempt failed.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        last: Box<ConnectError>,
    },
    /// Cancelled while connecting or backing off.
    #[error("connect cancelled")]
    Cancelled,
}

/// Failure to send a frame.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection is not in a sendable state; the transport was not touched.
    #[error("not connected")]
    NotConnected,
    /// The write failed.
    #[error("send failed: {0}")]
    Transport(#[source] Box<tungstenite::Error>),
}

/// Failure to receive a frame.
#[derive(Debug, Error)]
pub enum RecvError {
    /// The peer closed the connection, or it was already closed locally.
    #[error("connection closed")]
    Closed,
    /// The read failed.
    #[error("receive failed: {0}")]
    Transport(#[source] Box<tungstenite::Error>),
    /// A frame arrived but could not be decoded; the connection is still usable.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Failure to create a session over HTTP.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Request failed or returned a non-success status.
    #[error("session create request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Response body lacked the expected fields.
    #[error("unexpected session create response: {0}")]
    InvalidResponse(String),
}

/// Failure that ends [`AgentPlayer::play`](crate::AgentPlayer::play) before the loop starts.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No connection could be opened.
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

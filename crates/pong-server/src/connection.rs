//! Outbound side of one game WebSocket connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use pong_core::ServerMessage;
use tokio::sync::mpsc;
use tracing::warn;

/// Capacity of the per-connection outbound queue.
pub const SEND_QUEUE_CAPACITY: usize = 256;

/// Handle used by a session handler to queue frames for its client.
pub struct GameConnection {
    /// Unique connection ID.
    pub id: String,
    /// Session this connection is bound to.
    pub session_id: String,
    tx: mpsc::Sender<String>,
    connected_at: Instant,
    dropped_messages: AtomicU64,
}

impl GameConnection {
    /// Create a new connection.
    pub fn new(id: String, session_id: String, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            session_id,
            tx,
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a message for the client.
    ///
    /// Returns `false` if the queue is full or the writer has gone away,
    /// and increments the dropped message counter.
    pub fn send(&self, message: &ServerMessage) -> bool {
        if self.tx.try_send(message.to_json()).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            warn!(
                connection_id = %self.id,
                session_id = %self.session_id,
                kind = message.kind(),
                "outbound queue full or closed, dropping message"
            );
            false
        }
    }

    /// Queue several messages in order; stops at the first failure.
    pub fn send_all(&self, messages: &[ServerMessage]) -> bool {
        messages.iter().all(|m| self.send(m))
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

//! Server error types.

use thiserror::Error;

/// Errors that stop the server from serving.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Any other I/O failure of the listener.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

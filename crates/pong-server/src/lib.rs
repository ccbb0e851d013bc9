//! # pong-server
//!
//! Axum HTTP + `WebSocket` game service.
//!
//! - Session registry: id → game session, idempotent creation, single owner
//! - Game session handler: one task per connection, lockstep `move` and
//!   real-time ticking after `start`
//! - HTTP endpoints: session create/list/delete, health, service info
//! - Prometheus metrics at `/metrics` once a recorder is installed
//! - Graceful shutdown via `CancellationToken` + `TaskTracker`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod errors;
pub mod handler;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod service;
pub mod session;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use registry::{SessionEntry, SessionRegistry, SessionSummary};
pub use server::PongServer;
pub use service::GameService;
pub use session::{GameSession, Tick};
pub use shutdown::ShutdownCoordinator;

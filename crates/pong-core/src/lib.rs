//! # pong-core
//!
//! Shared building blocks for the Pong AI server and agent:
//!
//! - [`game`]: actions, sides, scores, observations and the `state` payload
//! - [`protocol`]: the JSON envelope exchanged over the WebSocket, one closed
//!   enum per direction, with an explicit `Unknown` fallback
//! - [`retry`]: exponential backoff for connect attempts

#![deny(unsafe_code)]

pub mod game;
pub mod protocol;
pub mod retry;

pub use game::{
    Action, BallState, GameState, GameStatus, Observation, PaddleState, Paddles, Scores, Side,
    Winner,
};
pub use protocol::{ClientMessage, DecodeError, ServerMessage};
pub use retry::RetryConfig;

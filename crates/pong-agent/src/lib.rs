//! # pong-agent
//!
//! Client side of the Pong session protocol.
//!
//! - [`Connection`]: owns one WebSocket; connect (with retry), send,
//!   receive-with-timeout, close
//! - [`AgentPlayer`]: the control loop that turns `state` frames into paddle
//!   commands through a [`Policy`](pong_sim::Policy), with keepalive pings
//! - [`SessionResolver`]: asks the game service over HTTP to create a session

#![deny(unsafe_code)]

pub mod commander;
pub mod connection;
pub mod errors;
pub mod observation;
pub mod player;
pub mod resolver;

pub use commander::PaddleCommander;
pub use connection::{Connection, ConnectionState, Incoming};
pub use errors::{AgentError, ConnectError, RecvError, ResolveError, SendError};
pub use observation::extract_observation;
pub use player::{AgentConfig, AgentPlayer, AgentState, PlayOutcome, PolicyFactory, StopReason};
pub use resolver::{CreatedSession, SessionResolver};

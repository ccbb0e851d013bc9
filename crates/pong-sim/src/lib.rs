//! # pong-sim
//!
//! The two collaborators the session protocol drives but does not define:
//!
//! - [`Simulation`]: advances ball and paddle physics one tick at a time.
//!   [`PongEngine`] is the reference implementation.
//! - [`Policy`]: maps an [`Observation`](pong_core::Observation) to an
//!   [`Action`](pong_core::Action). [`TrackingPolicy`] and [`RandomPolicy`]
//!   ship with the crate; any `Fn(&Observation) -> Action` also qualifies.

#![deny(unsafe_code)]

pub mod engine;
pub mod policy;

pub use engine::{EngineConfig, PongEngine, Simulation, StepInfo, StepOutcome};
pub use policy::{Policy, RandomPolicy, TrackingPolicy};

//! JSON envelope exchanged over the game WebSocket.
//!
//! Every frame is a JSON object with a `type` tag. Each direction has its own
//! closed enum; unknown tags decode to an `Unknown` variant so that newer
//! peers never break older ones. Structurally invalid frames produce a
//! [`DecodeError`] and the caller decides whether to ignore the frame or end
//! the session.
//!
//! State payloads (`state.data`, `reset.state`, `connected.state`) travel as
//! raw JSON so the agent can substitute defaults for malformed fields instead
//! of rejecting the whole frame.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::game::{Action, GameState, Scores, Side, Winner};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Why a frame could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON at all.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    /// JSON, but not an object with a string `type`.
    #[error("missing or non-string `type` field")]
    MissingType,
    /// Known `type` with fields of the wrong shape.
    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        /// The `type` tag of the offending frame.
        kind: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// Binary frame that is not UTF-8.
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client → server
// ─────────────────────────────────────────────────────────────────────────────

/// Frames sent by a player (agent or browser) to the game server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive.
    Ping,
    /// Begin real-time play.
    Start,
    /// Sticky direction for a paddle; persists until overridden.
    Paddle {
        /// Paddle to steer.
        paddle: Side,
        /// New direction.
        direction: Action,
    },
    /// Lockstep move: apply `action` to the player paddle and advance one tick.
    Move {
        /// Policy index (`0`, `1`, `2`); missing means stop.
        #[serde(default, with = "action_index")]
        action: Action,
    },
    /// Zero the scores and restart the round.
    Reset,
    /// Any tag this build does not know.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> String {
        to_json(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server → client
// ─────────────────────────────────────────────────────────────────────────────

/// Frames sent by the game server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame after the upgrade.
    Connected {
        /// Session the connection is bound to.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Paddle the client controls.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assigned_side: Option<Side>,
        /// Initial game state.
        #[serde(default, skip_serializing_if = "Value::is_null")]
        state: Value,
    },
    /// Game state after a tick.
    State {
        /// A [`GameState`] in JSON form.
        #[serde(default)]
        data: Value,
    },
    /// Round finished.
    #[serde(alias = "gameOver")]
    GameOver {
        /// Winning side, if the peer reports one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner: Option<Winner>,
        /// Final scores.
        #[serde(default)]
        scores: Scores,
        /// Same as `scores.left`.
        #[serde(default)]
        score_ai: u32,
        /// Same as `scores.right`.
        #[serde(default)]
        score_player: u32,
    },
    /// Keepalive acknowledgment.
    Pong,
    /// Server-side failure description.
    Error {
        /// Human-readable message.
        #[serde(default)]
        message: String,
    },
    /// State after a `reset`.
    Reset {
        /// A [`GameState`] in JSON form.
        #[serde(default)]
        state: Value,
    },
    /// Any tag this build does not know.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// `connected` frame for a freshly bound session.
    pub fn connected(session_id: &str, side: Side, state: &GameState) -> Self {
        Self::Connected {
            session_id: Some(session_id.to_owned()),
            assigned_side: Some(side),
            state: state_value(state),
        }
    }

    /// `state` frame.
    pub fn state(state: &GameState) -> Self {
        Self::State {
            data: state_value(state),
        }
    }

    /// `reset` frame.
    pub fn reset(state: &GameState) -> Self {
        Self::Reset {
            state: state_value(state),
        }
    }

    /// `game_over` frame; the winner is derived from the scores.
    pub fn game_over(scores: Scores) -> Self {
        Self::GameOver {
            winner: Some(scores.winner()),
            scores,
            score_ai: scores.left,
            score_player: scores.right,
        }
    }

    /// `error` frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::State { .. } => "state",
            Self::GameOver { .. } => "game_over",
            Self::Pong => "pong",
            Self::Error { .. } => "error",
            Self::Reset { .. } => "reset",
            Self::Unknown => "unknown",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> String {
        to_json(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────────────────────────────────────

/// Decode a client frame.
pub fn decode_client(text: &str) -> Result<ClientMessage, DecodeError> {
    decode(text)
}

/// Decode a server frame.
pub fn decode_server(text: &str) -> Result<ServerMessage, DecodeError> {
    decode(text)
}

/// Decode a binary frame carrying UTF-8 JSON.
pub fn decode_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
    decode(text)
}

/// Decode any envelope type, classifying failures.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

fn to_json<T: Serialize>(msg: &T) -> String {
    // Envelopes only contain strings, numbers and maps with string keys.
    serde_json::to_string(msg).unwrap_or_else(|_| String::from("{}"))
}

fn state_value(state: &GameState) -> Value {
    serde_json::to_value(state).unwrap_or(Value::Null)
}

/// `move.action` travels as the policy index rather than the action name.
mod action_index {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::game::Action;

    pub fn serialize<S: Serializer>(action: &Action, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(action.index())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Action, D::Error> {
        let index = u8::deserialize(d)?;
        Action::from_index(index)
            .ok_or_else(|| D::Error::custom(format!("action index {index} out of range 0..=2")))
    }
}

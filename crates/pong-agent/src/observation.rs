//! Observation extraction from a raw `state` payload.
//!
//! The payload comes from the wire as JSON. Ball position and both paddles
//! are required; if any of them is missing or not a number the whole
//! observation falls back to [`Observation::DEFAULT`]. Ball velocity
//! defaults to zero on its own.

use pong_core::{GameStatus, Observation, Scores};
use serde_json::Value;
use tracing::debug;

/// Observation for the decision function. Never fails.
pub fn extract_observation(data: &Value) -> Observation {
    try_extract(data).unwrap_or_else(|| {
        debug!("malformed state payload, using default observation");
        Observation::DEFAULT
    })
}

fn try_extract(data: &Value) -> Option<Observation> {
    let ball = data.get("ball")?;
    let paddles = data.get("paddles")?;
    Some(Observation {
        ball_x: number(ball, "x")?,
        ball_y: number(ball, "y")?,
        ball_vx: number(ball, "vx").unwrap_or(0.0),
        ball_vy: number(ball, "vy").unwrap_or(0.0),
        left_paddle: paddle_center(paddles.get("left")?)?,
        right_paddle: paddle_center(paddles.get("right")?)?,
    })
}

fn paddle_center(paddle: &Value) -> Option<f32> {
    Some(number(paddle, "y")? + number(paddle, "height")? / 2.0)
}

#[allow(clippy::cast_possible_truncation)]
fn number(value: &Value, key: &str) -> Option<f32> {
    value.get(key)?.as_f64().map(|n| n as f32)
}

/// Status reported by the payload, if readable.
pub fn status(data: &Value) -> Option<GameStatus> {
    serde_json::from_value(data.get("status")?.clone()).ok()
}

/// The payload says the round is over.
pub fn is_finished(data: &Value) -> bool {
    status(data) == Some(GameStatus::Finished)
        || data.get("game_over").and_then(Value::as_bool) == Some(true)
}

/// Scores from `scores`, else from the flat `score_ai`/`score_player` fields.
pub fn extract_scores(data: &Value) -> Scores {
    if let Some(scores) = data
        .get("scores")
        .and_then(|s| serde_json::from_value::<Scores>(s.clone()).ok())
    {
        return scores;
    }
    let flat = |key| {
        data.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    Scores {
        left: flat("score_ai"),
        right: flat("score_player"),
    }
}

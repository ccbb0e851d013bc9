//! Game data model shared by both ends of the connection.
//!
//! The server-internal AI always plays the [`Side::Left`] paddle and a remote
//! client is assigned [`Side::Right`]. `score_ai` is therefore the left score
//! and `score_player` the right one.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Action
// ─────────────────────────────────────────────────────────────────────────────

/// A paddle command produced by a decision function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Hold position.
    #[default]
    Stop,
    /// Move towards `y = 0`.
    Up,
    /// Move towards the bottom of the field.
    Down,
}

impl Action {
    /// All actions in index order.
    pub const ALL: [Self; 3] = [Self::Stop, Self::Up, Self::Down];

    /// Map a policy output index (`0 → stop`, `1 → up`, `2 → down`).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Stop),
            1 => Some(Self::Up),
            2 => Some(Self::Down),
            _ => None,
        }
    }

    /// Inverse of [`Action::from_index`].
    pub fn index(self) -> u8 {
        match self {
            Self::Stop => 0,
            Self::Up => 1,
            Self::Down => 2,
        }
    }

    /// Wire name (`"stop"`, `"up"`, `"down"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Signed vertical direction: `-1` for up, `1` for down, `0` for stop.
    pub fn direction(self) -> f32 {
        match self {
            Self::Stop => 0.0,
            Self::Up => -1.0,
            Self::Down => 1.0,
        }
    }
}

impl TryFrom<u8> for Action {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(value).ok_or(value)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sides, scores, winner
// ─────────────────────────────────────────────────────────────────────────────

/// One of the two paddles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left paddle (server AI).
    Left,
    /// Right paddle (remote player).
    Right,
}

impl Side {
    /// The other paddle.
    pub fn opponent(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points per side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    /// Left (AI) points.
    #[serde(default)]
    pub left: u32,
    /// Right (player) points.
    #[serde(default)]
    pub right: u32,
}

impl Scores {
    /// Points of one side.
    pub fn of(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Winner by strictly higher score; equal scores are a draw.
    pub fn winner(&self) -> Winner {
        match self.left.cmp(&self.right) {
            std::cmp::Ordering::Greater => Winner::Ai,
            std::cmp::Ordering::Less => Winner::Player,
            std::cmp::Ordering::Equal => Winner::Draw,
        }
    }
}

/// Outcome of a finished round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    /// The server AI (left) scored more.
    #[serde(alias = "AI")]
    Ai,
    /// The remote player (right) scored more.
    #[serde(alias = "Player")]
    Player,
    /// Equal scores, only reachable through truncation.
    Draw,
}

// ─────────────────────────────────────────────────────────────────────────────
// State payload
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a round as seen on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Reset, not yet started.
    #[default]
    Waiting,
    /// Ticking.
    Playing,
    /// Stopped mid-round.
    Paused,
    /// A side won or the round was truncated.
    Finished,
}

/// Ball position and velocity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    /// Horizontal position.
    pub x: f32,
    /// Vertical position.
    pub y: f32,
    /// Horizontal velocity per tick.
    pub vx: f32,
    /// Vertical velocity per tick.
    pub vy: f32,
    /// Ball radius.
    pub radius: f32,
}

/// Paddle top edge and height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaddleState {
    /// Top edge.
    pub y: f32,
    /// Paddle height.
    pub height: f32,
}

impl PaddleState {
    /// Vertical center of the paddle.
    pub fn center(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Both paddles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paddles {
    /// Left paddle.
    pub left: PaddleState,
    /// Right paddle.
    pub right: PaddleState,
}

impl Paddles {
    /// Paddle of one side.
    pub fn of(&self, side: Side) -> &PaddleState {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

/// Snapshot sent in `state`, `connected` and `reset` messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Ball.
    pub ball: BallState,
    /// Paddles.
    pub paddles: Paddles,
    /// Scores per side.
    pub scores: Scores,
    /// Round status.
    pub status: GameStatus,
    /// `true` once the round is finished.
    pub game_over: bool,
    /// Reward of the last tick from the AI's point of view.
    pub reward: f32,
    /// Same as `scores.left`.
    pub score_ai: u32,
    /// Same as `scores.right`.
    pub score_player: u32,
}

impl GameState {
    /// Observation vector for this snapshot.
    pub fn observation(&self) -> Observation {
        Observation {
            ball_x: self.ball.x,
            ball_y: self.ball.y,
            ball_vx: self.ball.vx,
            ball_vy: self.ball.vy,
            left_paddle: self.paddles.left.center(),
            right_paddle: self.paddles.right.center(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Observation
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed-length input of a decision function.
///
/// Always fully populated. Sources that cannot provide every field fall back
/// to [`Observation::DEFAULT`] as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Ball x.
    pub ball_x: f32,
    /// Ball y.
    pub ball_y: f32,
    /// Ball horizontal velocity.
    pub ball_vx: f32,
    /// Ball vertical velocity.
    pub ball_vy: f32,
    /// Center of the left paddle.
    pub left_paddle: f32,
    /// Center of the right paddle.
    pub right_paddle: f32,
}

impl Observation {
    /// Number of features.
    pub const LEN: usize = 6;

    /// Ball centered and still, both paddles centered.
    pub const DEFAULT: Self = Self {
        ball_x: 400.0,
        ball_y: 300.0,
        ball_vx: 0.0,
        ball_vy: 0.0,
        left_paddle: 300.0,
        right_paddle: 300.0,
    };

    /// Features in wire order.
    pub fn to_array(&self) -> [f32; Self::LEN] {
        [
            self.ball_x,
            self.ball_y,
            self.ball_vx,
            self.ball_vy,
            self.left_paddle,
            self.right_paddle,
        ]
    }

    /// Center of one paddle.
    pub fn paddle(&self, side: Side) -> f32 {
        match side {
            Side::Left => self.left_paddle,
            Side::Right => self.right_paddle,
        }
    }
}

impl Default for Observation {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<[f32; Observation::LEN]> for Observation {
    fn from(v: [f32; Observation::LEN]) -> Self {
        Self {
            ball_x: v[0],
            ball_y: v[1],
            ball_vx: v[2],
            ball_vy: v[3],
            left_paddle: v[4],
            right_paddle: v[5],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_mapping_is_total_over_indices() {
        assert_eq!(Action::from_index(0), Some(Action::Stop));
        assert_eq!(Action::from_index(1), Some(Action::Up));
        assert_eq!(Action::from_index(2), Some(Action::Down));
        assert_eq!(Action::from_index(3), None);
        assert_eq!(Action::from_index(255), None);
    }

    #[test]
    fn action_index_roundtrip() {
        for action in Action::ALL {
            assert_eq!(Action::from_index(action.index()), Some(action));
        }
    }

    #[test]
    fn action_names() {
        let names: Vec<&str> = Action::ALL.iter().map(|a| a.as_str()).collect();
        assert_eq!(names, ["stop", "up", "down"]);
        assert_eq!(serde_json::to_string(&Action::Up).unwrap(), "\"up\"");
    }

    #[test]
    fn try_from_rejects_out_of_range() {
        assert_eq!(Action::try_from(7), Err(7));
        assert_eq!(Action::try_from(2), Ok(Action::Down));
    }

    #[test]
    fn winner_strictly_higher() {
        assert_eq!(Scores { left: 5, right: 3 }.winner(), Winner::Ai);
        assert_eq!(Scores { left: 2, right: 5 }.winner(), Winner::Player);
    }

    #[test]
    fn tie_is_draw() {
        assert_eq!(Scores { left: 4, right: 4 }.winner(), Winner::Draw);
        assert_eq!(Scores::default().winner(), Winner::Draw);
    }

    #[test]
    fn side_opponent() {
        assert_eq!(Side::Left.opponent(), Side::Right);
        assert_eq!(Side::Right.opponent(), Side::Left);
    }

    #[test]
    fn observation_default_vector() {
        assert_eq!(
            Observation::default().to_array(),
            [400.0, 300.0, 0.0, 0.0, 300.0, 300.0]
        );
    }

    #[test]
    fn observation_from_state_uses_paddle_centers() {
        let state = GameState {
            ball: BallState { x: 10.0, y: 20.0, vx: 5.0, vy: -5.0, radius: 10.0 },
            paddles: Paddles {
                left: PaddleState { y: 100.0, height: 100.0 },
                right: PaddleState { y: 0.0, height: 100.0 },
            },
            scores: Scores::default(),
            status: GameStatus::Playing,
            game_over: false,
            reward: 0.0,
            score_ai: 0,
            score_player: 0,
        };
        assert_eq!(
            state.observation().to_array(),
            [10.0, 20.0, 5.0, -5.0, 150.0, 50.0]
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&GameStatus::Finished).unwrap();
        assert_eq!(json, "\"finished\"");
    }
}

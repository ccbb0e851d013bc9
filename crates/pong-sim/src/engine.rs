//! Reference paddle-physics engine.
//!
//! The AI paddle is the left one and is driven through [`Simulation::step`];
//! the player paddle is the right one and is moved by the caller through
//! [`Simulation::move_player`] before each step. Paddle positions are always
//! clamped to `[0, height - paddle_height]`.

use pong_core::{Action, BallState, GameState, GameStatus, Observation, PaddleState, Paddles, Scores};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Call contract of a one-tick simulation.
pub trait Simulation: Send {
    /// Restart the round: ball centered, paddles centered, scores zeroed.
    fn reset(&mut self) -> Observation;

    /// Apply `action` to the AI paddle and advance one tick.
    fn step(&mut self, action: Action) -> StepOutcome;

    /// Move the player paddle by one paddle-speed unit in the given direction.
    fn move_player(&mut self, action: Action);

    /// Current observation.
    fn observation(&self) -> Observation;

    /// Current scores.
    fn scores(&self) -> Scores;

    /// Snapshot for the wire. Status is `Finished` once the round ended and
    /// `Playing` otherwise; callers override it for other lifecycle phases.
    fn snapshot(&self) -> GameState;
}

/// Extra values returned with each step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepInfo {
    /// Left score.
    pub score_ai: u32,
    /// Right score.
    pub score_player: u32,
}

/// Result of [`Simulation::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    /// Observation after the tick.
    pub observation: Observation,
    /// `+1` when the AI scored, `-1` when the player scored, `0` otherwise.
    pub reward: f32,
    /// A side reached the winning score.
    pub done: bool,
    /// The step limit was reached.
    pub truncated: bool,
    /// Scores after the tick.
    pub info: StepInfo,
}

impl StepOutcome {
    /// `done || truncated`.
    pub fn is_terminal(&self) -> bool {
        self.done || self.truncated
    }
}

/// Field geometry and rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Field width.
    pub width: f32,
    /// Field height.
    pub height: f32,
    /// Paddle height.
    pub paddle_height: f32,
    /// Paddle width.
    pub paddle_width: f32,
    /// Gap between a paddle and its edge of the field.
    pub paddle_margin: f32,
    /// Paddle movement per tick.
    pub paddle_speed: f32,
    /// Ball radius.
    pub ball_radius: f32,
    /// Initial horizontal ball speed.
    pub ball_speed: f32,
    /// Points needed to win.
    pub winning_score: u32,
    /// Ticks after which a round is truncated.
    pub max_steps: u64,
    /// RNG seed for serve angles; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            paddle_height: 100.0,
            paddle_width: 10.0,
            paddle_margin: 20.0,
            paddle_speed: 8.0,
            ball_radius: 10.0,
            ball_speed: 5.0,
            winning_score: 5,
            max_steps: 20_000,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Highest valid paddle top edge.
    pub fn max_paddle_y(&self) -> f32 {
        (self.height - self.paddle_height).max(0.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct Ball {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
}

/// Reference [`Simulation`].
pub struct PongEngine {
    config: EngineConfig,
    ball: Ball,
    ai_y: f32,
    player_y: f32,
    scores: Scores,
    steps: u64,
    finished: bool,
    rng: StdRng,
}

impl PongEngine {
    /// Create an engine in its reset state.
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut engine = Self {
            ball: Ball {
                x: config.width / 2.0,
                y: config.height / 2.0,
                vx: config.ball_speed,
                vy: config.ball_speed,
            },
            ai_y: 0.0,
            player_y: 0.0,
            scores: Scores::default(),
            steps: 0,
            finished: false,
            rng,
            config,
        };
        let _ = engine.reset();
        engine
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ticks since the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn clamp_paddle(&self, y: f32) -> f32 {
        y.clamp(0.0, self.config.max_paddle_y())
    }

    fn serve(&mut self) {
        self.ball.x = self.config.width / 2.0;
        self.ball.y = self.config.height / 2.0;
        self.ball.vx = -self.ball.vx;
        self.ball.vy = self.rng.random_range(-5.0..5.0);
    }

    fn bounce_walls(&mut self) {
        let r = self.config.ball_radius;
        if self.ball.y - r <= 0.0 {
            self.ball.y = r;
            self.ball.vy = self.ball.vy.abs();
        } else if self.ball.y + r >= self.config.height {
            self.ball.y = self.config.height - r;
            self.ball.vy = -self.ball.vy.abs();
        }
    }

    fn bounce_paddles(&mut self) {
        let cfg = &self.config;
        let r = cfg.ball_radius;
        let left_face = cfg.paddle_margin + cfg.paddle_width;
        let right_face = cfg.width - cfg.paddle_margin - cfg.paddle_width;

        if self.ball.vx < 0.0 && self.ball.x - r <= left_face {
            if let Some(spin) = hit_spin(self.ball.y, self.ai_y, cfg.paddle_height) {
                self.ball.vx = -self.ball.vx;
                self.ball.vy = spin;
                self.ball.x = left_face + r;
            }
        } else if self.ball.vx > 0.0 && self.ball.x + r >= right_face {
            if let Some(spin) = hit_spin(self.ball.y, self.player_y, cfg.paddle_height) {
                self.ball.vx = -self.ball.vx;
                self.ball.vy = spin;
                self.ball.x = right_face - r;
            }
        }
    }

    /// Returns the reward for this tick.
    fn score_points(&mut self) -> f32 {
        let r = self.config.ball_radius;
        if self.ball.x - r <= 0.0 {
            self.scores.right += 1;
            self.serve();
            -1.0
        } else if self.ball.x + r >= self.config.width {
            self.scores.left += 1;
            self.serve();
            1.0
        } else {
            0.0
        }
    }
}

/// Vertical velocity after a paddle hit, or `None` when the ball misses.
fn hit_spin(ball_y: f32, paddle_y: f32, paddle_height: f32) -> Option<f32> {
    if ball_y >= paddle_y && ball_y <= paddle_y + paddle_height {
        let hit_pos = (ball_y - paddle_y) / paddle_height;
        Some((hit_pos - 0.5) * 10.0)
    } else {
        None
    }
}

impl Simulation for PongEngine {
    fn reset(&mut self) -> Observation {
        let centered = self.clamp_paddle(self.config.height / 2.0 - self.config.paddle_height / 2.0);
        self.ai_y = centered;
        self.player_y = centered;
        self.scores = Scores::default();
        self.steps = 0;
        self.finished = false;
        self.ball = Ball {
            x: self.config.width / 2.0,
            y: self.config.height / 2.0,
            vx: self.config.ball_speed,
            vy: self.rng.random_range(-5.0..5.0),
        };
        self.observation()
    }

    fn step(&mut self, action: Action) -> StepOutcome {
        if self.finished {
            return StepOutcome {
                observation: self.observation(),
                reward: 0.0,
                done: self.scores.left.max(self.scores.right) >= self.config.winning_score,
                truncated: self.steps >= self.config.max_steps,
                info: self.info(),
            };
        }

        self.ai_y = self.clamp_paddle(self.ai_y + action.direction() * self.config.paddle_speed);

        self.ball.x += self.ball.vx;
        self.ball.y += self.ball.vy;
        self.bounce_walls();
        self.bounce_paddles();
        let reward = self.score_points();
        self.steps += 1;

        let done = self.scores.left >= self.config.winning_score
            || self.scores.right >= self.config.winning_score;
        let truncated = !done && self.steps >= self.config.max_steps;
        self.finished = done || truncated;

        StepOutcome {
            observation: self.observation(),
            reward,
            done,
            truncated,
            info: self.info(),
        }
    }

    fn move_player(&mut self, action: Action) {
        self.player_y =
            self.clamp_paddle(self.player_y + action.direction() * self.config.paddle_speed);
    }

    fn observation(&self) -> Observation {
        let half = self.config.paddle_height / 2.0;
        Observation {
            ball_x: self.ball.x,
            ball_y: self.ball.y,
            ball_vx: self.ball.vx,
            ball_vy: self.ball.vy,
            left_paddle: self.ai_y + half,
            right_paddle: self.player_y + half,
        }
    }

    fn scores(&self) -> Scores {
        self.scores
    }

    fn snapshot(&self) -> GameState {
        GameState {
            ball: BallState {
                x: self.ball.x,
                y: self.ball.y,
                vx: self.ball.vx,
                vy: self.ball.vy,
                radius: self.config.ball_radius,
            },
            paddles: Paddles {
                left: PaddleState {
                    y: self.ai_y,
                    height: self.config.paddle_height,
                },
                right: PaddleState {
                    y: self.player_y,
                    height: self.config.paddle_height,
                },
            },
            scores: self.scores,
            status: if self.finished {
                GameStatus::Finished
            } else {
                GameStatus::Playing
            },
            game_over: self.finished,
            reward: 0.0,
            score_ai: self.scores.left,
            score_player: self.scores.right,
        }
    }
}

impl PongEngine {
    fn info(&self) -> StepInfo {
        StepInfo {
            score_ai: self.scores.left,
            score_player: self.scores.right,
        }
    }
}

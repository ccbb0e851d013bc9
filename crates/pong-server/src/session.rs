//! Game state owned by one session.
//!
//! The AI paddle (left) is driven by the session's policy; the player paddle
//! (right) follows either a lockstep `move` action or the sticky direction set
//! by `paddle` commands while real-time ticking is on.

use std::sync::Arc;

use pong_core::{Action, GameState, GameStatus, Scores};
use pong_sim::{Policy, Simulation};

/// Result of advancing the simulation by one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    /// State after the tick.
    pub state: GameState,
    /// The round finished on this tick. Set at most once per round.
    pub finished: bool,
}

/// Simulation plus the lifecycle around it.
pub struct GameSession {
    sim: Box<dyn Simulation>,
    policy: Arc<dyn Policy>,
    status: GameStatus,
    player_direction: Action,
    last_reward: f32,
}

impl GameSession {
    /// Wrap a simulation; the session starts in `waiting`.
    pub fn new(mut sim: Box<dyn Simulation>, policy: Arc<dyn Policy>) -> Self {
        let _ = sim.reset();
        Self {
            sim,
            policy,
            status: GameStatus::Waiting,
            player_direction: Action::Stop,
            last_reward: 0.0,
        }
    }

    /// Zero the scores and re-center everything. Status returns to `waiting`.
    pub fn reset(&mut self) -> GameState {
        let _ = self.sim.reset();
        self.status = GameStatus::Waiting;
        self.player_direction = Action::Stop;
        self.last_reward = 0.0;
        self.snapshot()
    }

    /// Enter `playing`. A finished round stays finished until reset.
    pub fn start(&mut self) -> GameState {
        if self.status != GameStatus::Finished {
            self.status = GameStatus::Playing;
        }
        self.snapshot()
    }

    /// Set the sticky direction of the player paddle.
    pub fn set_player_direction(&mut self, direction: Action) {
        self.player_direction = direction;
    }

    /// Current sticky direction of the player paddle.
    pub fn player_direction(&self) -> Action {
        self.player_direction
    }

    /// Lockstep: move the player paddle by `action`, then advance one tick.
    ///
    /// A waiting session starts playing. A finished session is not advanced.
    pub fn step(&mut self, action: Action) -> Tick {
        if self.status == GameStatus::Finished {
            return Tick {
                state: self.snapshot(),
                finished: false,
            };
        }
        self.status = GameStatus::Playing;
        self.advance(action)
    }

    /// Real-time tick with the sticky direction; `None` unless playing.
    pub fn tick(&mut self) -> Option<Tick> {
        if self.status != GameStatus::Playing {
            return None;
        }
        Some(self.advance(self.player_direction))
    }

    fn advance(&mut self, player_action: Action) -> Tick {
        self.sim.move_player(player_action);
        let ai_action = self.policy.predict(&self.sim.observation());
        let outcome = self.sim.step(ai_action);
        self.last_reward = outcome.reward;

        let finished = outcome.is_terminal();
        if finished {
            self.status = GameStatus::Finished;
        }
        Tick {
            state: self.snapshot(),
            finished,
        }
    }

    /// Wire snapshot with this session's status.
    pub fn snapshot(&self) -> GameState {
        let mut state = self.sim.snapshot();
        state.status = self.status;
        state.game_over = self.status == GameStatus::Finished;
        state.reward = self.last_reward;
        state
    }

    /// Lifecycle status.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Whether real-time ticking is on.
    pub fn is_playing(&self) -> bool {
        self.status == GameStatus::Playing
    }

    /// `true` once the round ended.
    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    /// Current scores.
    pub fn scores(&self) -> Scores {
        self.sim.scores()
    }

    /// Name of the policy driving the AI paddle.
    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pong_core::{Observation, Side};
    use pong_sim::{EngineConfig, PongEngine, TrackingPolicy};

    fn session_with(config: EngineConfig) -> GameSession {
        GameSession::new(
            Box::new(PongEngine::new(config)),
            Arc::new(TrackingPolicy::new(Side::Left)),
        )
    }

    fn seeded() -> GameSession {
        session_with(EngineConfig {
            seed: Some(11),
            ..EngineConfig::default()
        })
    }

    /// Ends a round quickly: tiny paddles and a policy that runs away.
    fn short_round() -> GameSession {
        GameSession::new(
            Box::new(PongEngine::new(EngineConfig {
                paddle_height: 1.0,
                winning_score: 1,
                seed: Some(3),
                ..EngineConfig::default()
            })),
            Arc::new(|_: &Observation| Action::Up),
        )
    }

    fn play_to_end(session: &mut GameSession) -> (usize, Tick) {
        for n in 1..=10_000 {
            let tick = session.step(Action::Down);
            if tick.finished {
                return (n, tick);
            }
        }
        panic!("round did not finish");
    }

    #[test]
    fn new_session_is_waiting_with_zero_scores() {
        let session = seeded();
        let state = session.snapshot();
        assert_eq!(state.status, GameStatus::Waiting);
        assert!(!state.game_over);
        assert_eq!(state.scores, Scores::default());
    }

    #[test]
    fn tick_requires_playing() {
        let mut session = seeded();
        assert!(session.tick().is_none());
        let _ = session.start();
        assert!(session.tick().is_some());
    }

    #[test]
    fn step_starts_a_waiting_session() {
        let mut session = seeded();
        let tick = session.step(Action::Stop);
        assert_eq!(tick.state.status, GameStatus::Playing);
        assert!(!tick.finished);
    }

    #[test]
    fn sticky_direction_moves_player_paddle() {
        let mut session = seeded();
        let before = session.snapshot().paddles.right.y;
        let _ = session.start();
        session.set_player_direction(Action::Up);
        let after = session.tick().unwrap().state.paddles.right.y;
        assert!(after < before);
        assert_eq!(session.player_direction(), Action::Up);
    }

    #[test]
    fn finished_is_reported_once() {
        let mut session = short_round();
        let (_, tick) = play_to_end(&mut session);
        assert!(tick.state.game_over);
        assert_eq!(tick.state.status, GameStatus::Finished);

        let again = session.step(Action::Down);
        assert!(!again.finished);
        assert!(again.state.game_over);
        assert!(session.tick().is_none());
    }

    #[test]
    fn start_does_not_revive_a_finished_round() {
        let mut session = short_round();
        let _ = play_to_end(&mut session);
        assert_eq!(session.start().status, GameStatus::Finished);
    }

    #[test]
    fn reset_zeroes_scores_and_clears_game_over() {
        let mut session = short_round();
        let _ = play_to_end(&mut session);
        assert!(session.scores().left + session.scores().right > 0);

        let state = session.reset();
        assert_eq!(state.scores, Scores::default());
        assert_eq!(state.score_ai, 0);
        assert_eq!(state.score_player, 0);
        assert!(!state.game_over);
        assert_eq!(state.status, GameStatus::Waiting);
        assert_eq!(session.player_direction(), Action::Stop);
    }

    #[test]
    fn scores_never_decrease_within_a_round() {
        let mut session = seeded();
        let mut last = Scores::default();
        for _ in 0..3000 {
            let tick = session.step(Action::Stop);
            assert!(tick.state.scores.left >= last.left);
            assert!(tick.state.scores.right >= last.right);
            last = tick.state.scores;
            if tick.finished {
                break;
            }
        }
    }

    #[test]
    fn policy_name_is_exposed() {
        assert_eq!(seeded().policy_name(), "tracking");
    }
}

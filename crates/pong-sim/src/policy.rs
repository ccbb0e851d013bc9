//! Decision functions.
//!
//! A [`Policy`] is a synchronous, side-effect free mapping from an
//! [`Observation`] to an [`Action`]. It may be deterministic or stochastic.

use parking_lot::Mutex;
use pong_core::{Action, Observation, Side};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Call contract of a decision function.
pub trait Policy: Send + Sync {
    /// Choose an action for the observation.
    fn predict(&self, observation: &Observation) -> Action;

    /// Short name for logs and the service metadata endpoint.
    fn name(&self) -> &str {
        "custom"
    }

    /// Whether the policy is loaded and able to predict.
    fn is_ready(&self) -> bool {
        true
    }
}

impl<F> Policy for F
where
    F: Fn(&Observation) -> Action + Send + Sync,
{
    fn predict(&self, observation: &Observation) -> Action {
        self(observation)
    }
}

/// Moves its paddle toward the ball's height.
#[derive(Clone, Debug)]
pub struct TrackingPolicy {
    side: Side,
    dead_zone: f32,
}

impl TrackingPolicy {
    /// Default half-width of the zone where the paddle holds still.
    pub const DEFAULT_DEAD_ZONE: f32 = 10.0;

    /// Track the ball with the paddle of `side`.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            dead_zone: Self::DEFAULT_DEAD_ZONE,
        }
    }

    /// Override the dead zone.
    #[must_use]
    pub fn with_dead_zone(mut self, dead_zone: f32) -> Self {
        self.dead_zone = dead_zone.max(0.0);
        self
    }

    /// Controlled paddle.
    pub fn side(&self) -> Side {
        self.side
    }
}

impl Policy for TrackingPolicy {
    fn predict(&self, observation: &Observation) -> Action {
        let paddle = observation.paddle(self.side);
        let offset = observation.ball_y - paddle;
        if offset < -self.dead_zone {
            Action::Up
        } else if offset > self.dead_zone {
            Action::Down
        } else {
            Action::Stop
        }
    }

    fn name(&self) -> &str {
        "tracking"
    }
}

/// Uniformly random actions.
pub struct RandomPolicy {
    rng: Mutex<StdRng>,
}

impl RandomPolicy {
    /// Seeded for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seeded from the OS.
    pub fn from_os() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }
}

impl Policy for RandomPolicy {
    fn predict(&self, _observation: &Observation) -> Action {
        let index: u8 = self.rng.lock().random_range(0..3);
        Action::from_index(index).unwrap_or_default()
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs_with(ball_y: f32, left: f32, right: f32) -> Observation {
        Observation {
            ball_y,
            left_paddle: left,
            right_paddle: right,
            ..Observation::DEFAULT
        }
    }

    #[test]
    fn tracking_moves_toward_ball() {
        let policy = TrackingPolicy::new(Side::Right);
        assert_eq!(policy.predict(&obs_with(100.0, 300.0, 300.0)), Action::Up);
        assert_eq!(policy.predict(&obs_with(500.0, 300.0, 300.0)), Action::Down);
        assert_eq!(policy.predict(&obs_with(305.0, 300.0, 300.0)), Action::Stop);
    }

    #[test]
    fn tracking_uses_its_own_paddle() {
        let left = TrackingPolicy::new(Side::Left);
        let right = TrackingPolicy::new(Side::Right);
        let obs = obs_with(300.0, 100.0, 500.0);
        assert_eq!(left.predict(&obs), Action::Down);
        assert_eq!(right.predict(&obs), Action::Up);
    }

    #[test]
    fn default_observation_holds_still() {
        let policy = TrackingPolicy::new(Side::Right);
        assert_eq!(policy.predict(&Observation::DEFAULT), Action::Stop);
    }

    #[test]
    fn dead_zone_is_never_negative() {
        let policy = TrackingPolicy::new(Side::Left).with_dead_zone(-5.0);
        assert_eq!(policy.predict(&obs_with(300.0, 300.0, 0.0)), Action::Stop);
        assert_eq!(policy.predict(&obs_with(300.5, 300.0, 0.0)), Action::Down);
    }

    #[test]
    fn random_policy_is_reproducible() {
        let a = RandomPolicy::seeded(42);
        let b = RandomPolicy::seeded(42);
        let obs = Observation::DEFAULT;
        let xs: Vec<Action> = (0..32).map(|_| a.predict(&obs)).collect();
        let ys: Vec<Action> = (0..32).map(|_| b.predict(&obs)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn random_policy_covers_all_actions() {
        let policy = RandomPolicy::seeded(1);
        let seen: std::collections::HashSet<Action> =
            (0..200).map(|_| policy.predict(&Observation::DEFAULT)).collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn closures_are_policies() {
        let always_up = |_: &Observation| Action::Up;
        assert_eq!(always_up.predict(&Observation::DEFAULT), Action::Up);
        assert_eq!(Policy::name(&always_up), "custom");
        assert!(always_up.is_ready());
    }

    #[test]
    fn names() {
        assert_eq!(TrackingPolicy::new(Side::Left).name(), "tracking");
        assert_eq!(RandomPolicy::seeded(0).name(), "random");
    }
}

//! Settings types.
//!
//! Every struct uses `#[serde(default)]` so a settings file only needs the
//! keys it overrides.

mod agent;
mod server;

pub use agent::AgentSettings;
pub use server::ServerSettings;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PongSettings {
    /// Game server.
    pub server: ServerSettings,
    /// Agent client.
    pub agent: AgentSettings,
    /// Game rules and the server-side opponent.
    pub game: GameSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Decision function used by a player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Follow the ball.
    #[default]
    Tracking,
    /// Uniformly random actions.
    Random,
}

impl PolicyKind {
    /// Parse a policy name (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "tracking" => Some(Self::Tracking),
            "random" => Some(Self::Random),
            _ => None,
        }
    }
}

/// Game rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSettings {
    /// Points needed to win a round.
    pub winning_score: u32,
    /// Ticks after which a round is truncated.
    pub max_steps: u64,
    /// Seed for serve angles and the random policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Policy driving the server-side paddle.
    pub policy: PolicyKind,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            winning_score: 5,
            max_steps: 20_000,
            seed: None,
            policy: PolicyKind::Tracking,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter (`RUST_LOG` takes precedence).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module levels, e.g. `{"pong_server": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}

impl LoggingSettings {
    /// `EnvFilter` directive string: `level[,module=level...]`.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.level.to_lowercase();
        for (module, level) in &self.modules {
            filter.push(',');
            filter.push_str(module);
            filter.push('=');
            filter.push_str(&level.to_lowercase());
        }
        filter
    }
}

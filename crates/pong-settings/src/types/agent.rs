use pong_core::RetryConfig;
use serde::{Deserialize, Serialize};

use super::PolicyKind;

/// Agent client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Game service host name.
    pub service_host: String,
    /// Game service port.
    pub service_port: u16,
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
    /// How long to wait for a frame before sending a keepalive ping, in ms.
    pub receive_timeout_ms: u64,
    /// Consecutive undecodable frames tolerated before giving up.
    pub max_decode_errors: u32,
    /// Connect retry policy.
    pub retry: RetryConfig,
    /// Decision function of the agent.
    pub policy: PolicyKind,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            service_host: "game-service".to_string(),
            service_port: 3003,
            secure: false,
            receive_timeout_ms: 5000,
            max_decode_errors: 3,
            retry: RetryConfig::default(),
            policy: PolicyKind::Tracking,
        }
    }
}

impl AgentSettings {
    /// `{ws|wss}://host:port`.
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}", self.service_host, self.service_port)
    }
}

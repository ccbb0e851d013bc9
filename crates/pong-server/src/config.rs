//! Server configuration.

use std::time::Duration;

use pong_settings::{PolicyKind, PongSettings};
use pong_sim::EngineConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the game server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Real-time tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// How long shutdown waits for handlers to finish, in seconds.
    pub shutdown_timeout_secs: u64,
    /// Consecutive undecodable frames before the connection is closed; `0` disables.
    pub max_decode_errors: u32,
    /// Rules for every new session.
    pub engine: EngineConfig,
    /// Policy driving the server-side paddle.
    pub policy: PolicyKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 256,
            max_message_size: 64 * 1024,
            tick_interval_ms: 16,
            shutdown_timeout_secs: 10,
            max_decode_errors: 3,
            engine: EngineConfig::default(),
            policy: PolicyKind::Tracking,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &PongSettings) -> Self {
        let server = &settings.server;
        let game = &settings.game;
        Self {
            host: server.host.clone(),
            port: server.port,
            max_connections: server.max_connections,
            max_message_size: server.max_message_size,
            tick_interval_ms: server.tick_interval_ms,
            shutdown_timeout_secs: server.shutdown_timeout_secs,
            max_decode_errors: server.max_decode_errors,
            engine: EngineConfig {
                winning_score: game.winning_score,
                max_steps: game.max_steps,
                seed: game.seed,
                ..EngineConfig::default()
            },
            policy: game.policy,
        }
    }

    /// `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Real-time tick period; never zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Shutdown drain timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_with_auto_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_tick_is_about_sixty_fps() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.tick_interval(), Duration::from_millis(16));
    }

    #[test]
    fn zero_tick_is_clamped() {
        let cfg = ServerConfig {
            tick_interval_ms: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn from_settings_copies_game_rules() {
        let mut settings = PongSettings::default();
        settings.server.port = 4242;
        settings.game.winning_score = 3;
        settings.game.seed = Some(7);
        settings.game.policy = PolicyKind::Random;
        settings.server.max_decode_errors = 7;

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.port, 4242);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.engine.winning_score, 3);
        assert_eq!(cfg.engine.seed, Some(7));
        assert_eq!(cfg.engine.width, 800.0);
        assert_eq!(cfg.policy, PolicyKind::Random);
        assert_eq!(cfg.max_decode_errors, 7);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.port, cfg.port);
        assert_eq!(back.engine, cfg.engine);
    }
}

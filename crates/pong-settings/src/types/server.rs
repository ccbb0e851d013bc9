use serde::{Deserialize, Serialize};

/// Game server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Real-time tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// How long shutdown waits for connections to drain, in seconds.
    pub shutdown_timeout_secs: u64,
    /// Consecutive undecodable client frames tolerated; `0` tolerates any number.
    pub max_decode_errors: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3006,
            max_connections: 256,
            max_message_size: 64 * 1024,
            tick_interval_ms: 16,
            shutdown_timeout_secs: 10,
            max_decode_errors: 3,
        }
    }
}

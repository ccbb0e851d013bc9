//! `/health` and `/` endpoint bodies.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the server is running.
    pub status: String,
    /// Whether the decision function is ready to predict.
    pub model_loaded: bool,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Number of registered sessions.
    pub active_sessions: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    model_loaded: bool,
    connections: usize,
    sessions: usize,
) -> HealthResponse {
    HealthResponse {
        status: "healthy".into(),
        model_loaded,
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_sessions: sessions,
    }
}

/// `stats` object of the service info response.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    /// Number of registered sessions.
    pub active_sessions: usize,
    /// Whether the decision function is ready to predict.
    pub model_loaded: bool,
    /// Name of the server-side policy.
    pub policy: String,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Always `"running"`.
    pub status: &'static str,
    /// Live counters.
    pub stats: ServiceStats,
}

/// Build the service info response.
pub fn service_info(stats: ServiceStats) -> ServiceInfo {
    ServiceInfo {
        service: "Pong AI",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        stats,
    }
}

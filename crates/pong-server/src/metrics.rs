//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns the handle that renders `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Connections refused because the session was already bound (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Live WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Outbound frames dropped because a client's queue was full or closed (counter).
pub const WS_MESSAGES_DROPPED_TOTAL: &str = "ws_messages_dropped_total";
/// Undecodable client frames (counter).
pub const WS_DECODE_ERRORS_TOTAL: &str = "ws_decode_errors_total";
/// Rounds that reached a terminal state (counter).
pub const GAME_SESSIONS_FINISHED_TOTAL: &str = "game_sessions_finished_total";

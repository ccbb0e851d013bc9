//! `PongServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use pong_core::GameState;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::handler::run_game_session;
use crate::health::{HealthResponse, ServiceInfo};
use crate::registry::SessionSummary;
use crate::service::GameService;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry, policy and counters.
    pub service: Arc<GameService>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus handle rendered at `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The game server.
pub struct PongServer {
    service: Arc<GameService>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
}

impl PongServer {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_service(GameService::new(config))
    }

    /// Create a server around a prepared service.
    pub fn with_service(service: GameService) -> Self {
        Self {
            service: Arc::new(service),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: Arc::clone(&self.service),
            shutdown: Arc::clone(&self.shutdown),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/session/create", post(create_session_handler))
            .route("/session/{session_id}", delete(delete_session_handler))
            .route("/sessions", get(list_sessions_handler))
            .route("/ws/game/{session_id}", get(ws_handler))
            .route("/ws/{session_id}", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve in a background task.
    ///
    /// The task ends once the shutdown coordinator fires.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.service.config().bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server stopped with error");
            }
        });

        info!(%local_addr, "pong server listening");
        Ok((local_addr, handle))
    }

    /// Get the service context.
    pub fn service(&self) -> &Arc<GameService> {
        &self.service
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        self.service.config()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Query of `POST /session/create`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionParams {
    /// Requested id; generated when absent.
    pub session_id: Option<String>,
}

/// Body returned by `POST /session/create`.
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// Session id.
    pub session_id: String,
    /// State after creation.
    pub initial_state: GameState,
    /// Path of the game WebSocket.
    pub ws_url: String,
}

/// Body returned by `GET /sessions`.
#[derive(Debug, Serialize)]
pub struct SessionList {
    /// One row per session.
    pub sessions: Vec<SessionSummary>,
}

/// Body returned by `DELETE /session/{id}`.
#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    /// Always `"deleted"`.
    pub status: &'static str,
    /// Session id.
    pub session_id: String,
}

/// GET /
async fn root_handler(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.service.info())
}

/// GET|HEAD /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.service.health())
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            crate::metrics::render(handle),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// POST /session/create?session_id=
async fn create_session_handler(
    State(state): State<AppState>,
    Query(params): Query<CreateSessionParams>,
) -> Json<CreateSessionResponse> {
    let session_id = params
        .session_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("session_{}", Uuid::now_v7()));

    let entry = state.service.registry().create_or_get(&session_id);
    let initial_state = {
        let mut game = entry.game();
        // A live connection owns the simulation; do not reset under it.
        if entry.is_bound() {
            game.snapshot()
        } else {
            game.reset()
        }
    };

    Json(CreateSessionResponse {
        status: "success",
        ws_url: format!("/ws/game/{session_id}"),
        session_id,
        initial_state,
    })
}

/// GET /sessions
async fn list_sessions_handler(State(state): State<AppState>) -> Json<SessionList> {
    Json(SessionList {
        sessions: state.service.registry().list(),
    })
}

/// DELETE /session/{session_id}
async fn delete_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<DeleteSessionResponse> {
    let _ = state.service.registry().delete(&session_id);
    Json(DeleteSessionResponse {
        status: "deleted",
        session_id,
    })
}

/// GET /ws/game/{session_id} and GET /ws/{session_id}
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
    }
    if !state.service.try_acquire_connection() {
        warn!(%session_id, "connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let connection_id = format!("conn_{}", Uuid::now_v7());
    let max_message_size = state.service.config().max_message_size;
    let failed_service = Arc::clone(&state.service);
    let service = state.service;
    let shutdown = state.shutdown;

    ws.max_message_size(max_message_size)
        .on_failed_upgrade(move |e| {
            warn!(error = %e, "websocket upgrade failed");
            failed_service.release_connection();
        })
        .on_upgrade(move |socket| {
            // Registered only once the handshake completed.
            let entry = service.registry().create_or_get(&session_id);
            shutdown.track(run_game_session(
                socket,
                connection_id,
                entry,
                service,
                shutdown.token(),
            ))
        })
}

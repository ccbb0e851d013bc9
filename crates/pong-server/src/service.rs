//! Service context shared by every HTTP and WebSocket handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use pong_core::Side;
use pong_settings::PolicyKind;
use pong_sim::{PongEngine, Policy, RandomPolicy, TrackingPolicy};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse, ServiceInfo, ServiceStats};
use crate::registry::SessionRegistry;
use crate::session::GameSession;

/// Side played by the server-internal AI.
pub const AI_SIDE: Side = Side::Left;
/// Side assigned to a remote client.
pub const CLIENT_SIDE: Side = Side::Right;

/// Registry, policy and live counters of one server instance.
pub struct GameService {
    config: ServerConfig,
    registry: SessionRegistry,
    policy: Arc<dyn Policy>,
    connections: AtomicUsize,
    start_time: Instant,
}

impl GameService {
    /// Build the service from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let policy = build_policy(config.policy, config.engine.seed);
        Self::with_policy(config, policy)
    }

    /// Build the service with an explicit server-side policy.
    pub fn with_policy(config: ServerConfig, policy: Arc<dyn Policy>) -> Self {
        let engine = config.engine.clone();
        let session_policy = Arc::clone(&policy);
        let registry = SessionRegistry::new(Arc::new(move || {
            GameSession::new(
                Box::new(PongEngine::new(engine.clone())),
                Arc::clone(&session_policy),
            )
        }));
        Self {
            config,
            registry,
            policy,
            connections: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Server-side policy.
    pub fn policy(&self) -> &Arc<dyn Policy> {
        &self.policy
    }

    /// Reserve a connection slot. Returns `false` at the connection limit.
    pub fn try_acquire_connection(&self) -> bool {
        let max = self.config.max_connections;
        self.connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .is_ok()
    }

    /// Release a slot taken by [`try_acquire_connection`](Self::try_acquire_connection).
    pub fn release_connection(&self) {
        let _ = self
            .connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Live WebSocket connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// Body of `GET /health`.
    pub fn health(&self) -> HealthResponse {
        health::health_check(
            self.start_time,
            self.policy.is_ready(),
            self.connection_count(),
            self.registry.len(),
        )
    }

    /// Body of `GET /`.
    pub fn info(&self) -> ServiceInfo {
        health::service_info(ServiceStats {
            active_sessions: self.registry.len(),
            model_loaded: self.policy.is_ready(),
            policy: self.policy.name().to_owned(),
        })
    }
}

/// Policy for the AI paddle.
pub fn build_policy(kind: PolicyKind, seed: Option<u64>) -> Arc<dyn Policy> {
    match kind {
        PolicyKind::Tracking => Arc::new(TrackingPolicy::new(AI_SIDE)),
        PolicyKind::Random => Arc::new(seed.map_or_else(RandomPolicy::from_os, RandomPolicy::seeded)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pong_core::{Action, Observation};

    #[test]
    fn sessions_use_the_configured_rules() {
        let mut config = ServerConfig::default();
        config.engine.winning_score = 2;
        let service = GameService::new(config);
        let entry = service.registry().create_or_get("s1");
        assert_eq!(entry.game().policy_name(), "tracking");
        assert_eq!(service.registry().len(), 1);
    }

    #[test]
    fn connection_limit_is_enforced() {
        let config = ServerConfig {
            max_connections: 2,
            ..ServerConfig::default()
        };
        let service = GameService::new(config);
        assert!(service.try_acquire_connection());
        assert!(service.try_acquire_connection());
        assert!(!service.try_acquire_connection());
        assert_eq!(service.connection_count(), 2);

        service.release_connection();
        assert!(service.try_acquire_connection());
    }

    #[test]
    fn release_never_underflows() {
        let service = GameService::new(ServerConfig::default());
        service.release_connection();
        assert_eq!(service.connection_count(), 0);
    }

    #[test]
    fn random_policy_selected_by_kind() {
        let policy = build_policy(PolicyKind::Random, Some(5));
        assert_eq!(policy.name(), "random");
        assert_eq!(build_policy(PolicyKind::Tracking, None).name(), "tracking");
    }

    #[test]
    fn custom_policy_is_reported() {
        let policy: Arc<dyn Policy> = Arc::new(|_: &Observation| Action::Stop);
        let service = GameService::with_policy(ServerConfig::default(), policy);
        let info = service.info();
        assert_eq!(info.stats.policy, "custom");
        assert!(service.health().model_loaded);
    }
}

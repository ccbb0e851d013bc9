//! Agent against a live game server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pong_agent::{AgentConfig, AgentPlayer, SessionResolver, StopReason};
use pong_core::{Action, Observation, RetryConfig, Side, Winner};
use pong_server::{GameService, PongServer, ServerConfig};
use pong_sim::{EngineConfig, TrackingPolicy};

/// Server whose AI never defends and whose rounds end at the first point.
async fn boot_short_rounds() -> (SocketAddr, Arc<PongServer>) {
    let config = ServerConfig {
        tick_interval_ms: 2,
        engine: EngineConfig {
            paddle_height: 1.0,
            winning_score: 1,
            seed: Some(9),
            ..EngineConfig::default()
        },
        ..ServerConfig::default()
    };
    let service = GameService::with_policy(config, Arc::new(|_: &Observation| Action::Up));
    let server = Arc::new(PongServer::with_service(service));
    let (addr, _handle) = server.listen().await.unwrap();
    (addr, server)
}

fn agent_config(addr: SocketAddr) -> AgentConfig {
    AgentConfig {
        base_url: format!("ws://{addr}"),
        receive_timeout: Duration::from_secs(2),
        max_decode_errors: 3,
        retry: RetryConfig::none(),
        side: Side::Right,
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn agent_plays_a_round_to_completion() {
    let (addr, server) = boot_short_rounds().await;

    let mut agent = AgentPlayer::new(agent_config(addr), TrackingPolicy::new(Side::Right));
    let outcome = tokio::time::timeout(Duration::from_secs(30), agent.play("e2e-1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.reason, StopReason::GameFinished);
    assert_eq!(outcome.scores.left + outcome.scores.right, 1);
    assert_eq!(outcome.winner, Some(outcome.scores.winner()));
    assert_ne!(outcome.winner, Some(Winner::Draw));
    assert!(outcome.ticks > 0);
    assert!(outcome.commands_sent > 0);

    let registry = server.service().registry();
    wait_until(|| registry.get("e2e-1").is_none()).await;
    wait_until(|| server.service().connection_count() == 0).await;
}

#[tokio::test]
async fn agent_plays_a_session_created_over_http() {
    let (addr, server) = boot_short_rounds().await;

    let resolver = SessionResolver::new(&format!("ws://{addr}")).unwrap();
    let created = resolver.create(Some("e2e-2")).await.unwrap();
    assert_eq!(created.session_id, "e2e-2");
    assert_eq!(created.ws_url, "/ws/game/e2e-2");
    assert_eq!(created.initial_state["game_over"], false);
    assert!(server.service().registry().get("e2e-2").is_some());

    let mut agent = AgentPlayer::new(agent_config(addr), TrackingPolicy::new(Side::Right));
    let outcome = agent.play(&created.session_id).await.unwrap();
    assert!(outcome.is_complete());
}

#[tokio::test]
async fn server_generates_an_id_when_none_given() {
    let (addr, _server) = boot_short_rounds().await;
    let resolver = SessionResolver::new(&format!("http://{addr}")).unwrap();
    let created = resolver.create(None).await.unwrap();
    assert!(created.session_id.starts_with("session_"));
}

#[tokio::test]
async fn second_agent_on_a_bound_session_stops_with_server_error() {
    let (addr, server) = boot_short_rounds().await;

    // Hold the session with a silent agent that never starts the game.
    let first = pong_agent::Connection::connect(&format!("ws://{addr}/ws/e2e-3"))
        .await
        .unwrap();
    let registry = server.service().registry();
    wait_until(|| registry.get("e2e-3").is_some_and(|e| e.is_bound())).await;

    let mut agent = AgentPlayer::new(agent_config(addr), TrackingPolicy::new(Side::Right));
    let outcome = agent.play("e2e-3").await.unwrap();
    // The server may close before the agent's opening frames are written.
    match outcome.reason {
        StopReason::ServerError(message) => {
            assert_eq!(message, "session already has an active connection");
        }
        StopReason::TransportError(_) | StopReason::ConnectionClosed => {}
        other => panic!("unexpected reason: {other:?}"),
    }
    assert!(registry.get("e2e-3").is_some_and(|e| e.is_bound()));
    drop(first);
}

#[tokio::test]
async fn agent_stops_when_server_shuts_down() {
    let (addr, server) = boot_short_rounds().await;

    let mut config = agent_config(addr);
    config.receive_timeout = Duration::from_millis(200);
    // Never let the round end on its own.
    let mut agent = AgentPlayer::new(config, |_: &Observation| Action::Stop);

    let shutdown = Arc::clone(&server);
    let _ = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = shutdown.shutdown().graceful_shutdown(Some(Duration::from_secs(5))).await;
    });

    let outcome = agent.play("e2e-4").await.unwrap();
    assert!(
        matches!(
            outcome.reason,
            StopReason::ServerError(_)
                | StopReason::ConnectionClosed
                | StopReason::TransportError(_)
                | StopReason::GameFinished
        ),
        "unexpected reason: {:?}",
        outcome.reason
    );
}

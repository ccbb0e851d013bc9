//! # pong-ai
//!
//! `pong-ai serve` runs the game service; `pong-ai play` joins a session as
//! the AI agent and plays it to the end.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pong_agent::{AgentConfig, AgentPlayer, PlayOutcome, SessionResolver};
use pong_core::{Action, Observation, Side};
use pong_server::{PongServer, ServerConfig};
use pong_settings::{PolicyKind, PongSettings};
use pong_sim::{Policy, RandomPolicy, TrackingPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Pong AI game service and agent.
#[derive(Parser, Debug)]
#[command(name = "pong-ai", about = "Pong AI game service and agent", version)]
struct Cli {
    /// Settings file (defaults to `$PONG_SETTINGS`, then `~/.pong/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the game service.
    Serve {
        /// Host to bind.
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,

        /// Real-time tick period in milliseconds.
        #[arg(long)]
        tick_ms: Option<u64>,
    },
    /// Play one session as the AI agent.
    Play {
        /// Session to join.
        session_id: String,

        /// Game service base URL (`ws://host:port` or `wss://host:port`).
        #[arg(long)]
        url: Option<String>,

        /// Create the session over HTTP before joining.
        #[arg(long)]
        create: bool,

        /// Receive timeout before a keepalive ping, in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn load_settings(path: Option<&Path>) -> Result<PongSettings> {
    let settings = match path {
        Some(path) => pong_settings::load_settings_from_path(path),
        None => pong_settings::load_settings(),
    };
    settings.context("Failed to load settings")
}

fn server_config(
    settings: &PongSettings,
    host: Option<String>,
    port: Option<u16>,
    tick_ms: Option<u64>,
) -> ServerConfig {
    let mut config = ServerConfig::from_settings(settings);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(tick_ms) = tick_ms {
        config.tick_interval_ms = tick_ms;
    }
    config
}

fn agent_config(
    settings: &PongSettings,
    url: Option<String>,
    timeout_ms: Option<u64>,
) -> AgentConfig {
    let mut config = AgentConfig::from_settings(&settings.agent);
    if let Some(url) = url {
        config.base_url = url;
    }
    if let Some(ms) = timeout_ms {
        config.receive_timeout = Duration::from_millis(ms);
    }
    config
}

/// Decision function of the agent for the paddle on `side`.
fn agent_policy(
    kind: PolicyKind,
    seed: Option<u64>,
    side: Side,
) -> impl Fn(&Observation) -> Action + Send + Sync {
    let policy: Box<dyn Policy> = match kind {
        PolicyKind::Tracking => Box::new(TrackingPolicy::new(side)),
        PolicyKind::Random => Box::new(seed.map_or_else(RandomPolicy::from_os, RandomPolicy::seeded)),
    };
    move |obs: &Observation| policy.predict(obs)
}

async fn serve(settings: &PongSettings, config: ServerConfig) -> Result<()> {
    let shutdown_timeout = config.shutdown_timeout();
    let metrics = pong_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let server = PongServer::new(config).with_metrics(metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!(
        %addr,
        policy = ?settings.game.policy,
        winning_score = settings.game.winning_score,
        "Pong AI listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Shutting down...");
    if !server.shutdown().graceful_shutdown(Some(shutdown_timeout)).await {
        warn!(
            active = server.shutdown().active(),
            "Connections still open after shutdown timeout"
        );
    }
    let _ = handle.await;
    info!("Shutdown complete");
    Ok(())
}

async fn play(
    settings: &PongSettings,
    config: AgentConfig,
    session_id: String,
    create: bool,
) -> Result<PlayOutcome> {
    let session_id = if create {
        let resolver =
            SessionResolver::new(&config.base_url).context("Failed to build HTTP client")?;
        resolver
            .create(Some(&session_id))
            .await
            .context("Failed to create session")?
            .session_id
    } else {
        session_id
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let _signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping agent");
            on_signal.cancel();
        }
    });

    let (kind, seed) = (settings.agent.policy, settings.game.seed);
    let mut agent =
        AgentPlayer::for_side(config, move |side| agent_policy(kind, seed, side)).with_cancel(cancel);
    agent
        .play(&session_id)
        .await
        .with_context(|| format!("Failed to join session {session_id}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_deref())?;
    pong_logging::init_logging(&settings.logging).context("Failed to initialize logging")?;

    match cli.command {
        Command::Serve { host, port, tick_ms } => {
            let config = server_config(&settings, host, port, tick_ms);
            serve(&settings, config).await
        }
        Command::Play {
            session_id,
            url,
            create,
            timeout_ms,
        } => {
            let config = agent_config(&settings, url, timeout_ms);
            let outcome = play(&settings, config, session_id, create).await?;
            println!(
                "session {}: {:?} (ai {} - player {}, {} ticks, {} commands)",
                outcome.session_id,
                outcome.reason,
                outcome.scores.left,
                outcome.scores.right,
                outcome.ticks,
                outcome.commands_sent,
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_serve_flags() {
        let cli = Cli::parse_from(["pong-ai", "serve", "--port", "4000", "--tick-ms", "8"]);
        match cli.command {
            Command::Serve { host, port, tick_ms } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(4000));
                assert_eq!(tick_ms, Some(8));
            }
            Command::Play { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn cli_play_requires_session_id() {
        assert!(Cli::try_parse_from(["pong-ai", "play"]).is_err());

        let cli = Cli::parse_from([
            "pong-ai",
            "play",
            "abc",
            "--create",
            "--url",
            "ws://localhost:3003",
            "--settings",
            "/tmp/s.json",
        ]);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
        match cli.command {
            Command::Play {
                session_id,
                url,
                create,
                timeout_ms,
            } => {
                assert_eq!(session_id, "abc");
                assert_eq!(url.as_deref(), Some("ws://localhost:3003"));
                assert!(create);
                assert_eq!(timeout_ms, None);
            }
            Command::Serve { .. } => panic!("expected play"),
        }
    }

    #[test]
    fn flags_override_settings() {
        let settings = PongSettings::default();
        let config = server_config(&settings, Some("0.0.0.0".into()), Some(9000), None);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.tick_interval_ms, settings.server.tick_interval_ms);

        let agent = agent_config(&settings, Some("ws://127.0.0.1:1".into()), Some(250));
        assert_eq!(agent.base_url, "ws://127.0.0.1:1");
        assert_eq!(agent.receive_timeout, Duration::from_millis(250));
        assert_eq!(agent.endpoint("x"), "ws://127.0.0.1:1/ws/x");
    }

    #[test]
    fn settings_file_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"game": {"winningScore": 3}}"#).unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.game.winning_score, 3);
        assert_eq!(server_config(&settings, None, None, None).engine.winning_score, 3);
    }

    #[test]
    fn invalid_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_settings(Some(&path)).is_err());
    }

    #[test]
    fn agent_policy_tracks_its_own_paddle() {
        let obs = Observation {
            ball_y: 100.0,
            left_paddle: 500.0,
            right_paddle: 100.0,
            ..Observation::DEFAULT
        };
        assert_eq!(agent_policy(PolicyKind::Tracking, None, Side::Left)(&obs), Action::Up);
        assert_eq!(agent_policy(PolicyKind::Tracking, None, Side::Right)(&obs), Action::Stop);
    }
}

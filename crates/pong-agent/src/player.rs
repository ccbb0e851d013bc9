//! The agent control loop.
//!
//! ```text
//! Idle → Connecting → Connected → Playing → Stopped
//! ```
//!
//! After connecting the agent sends `ping` then `start`, and from then on
//! answers every `playing` state with a paddle command chosen by its policy.
//! A quiet connection gets one keepalive `ping` per receive timeout. The
//! loop ends on a finished state, `game_over`, `error`, transport failure,
//! too many undecodable frames, or cancellation. The connection is closed
//! exactly once on every exit path.

use std::time::Duration;

use pong_core::{ClientMessage, GameStatus, RetryConfig, Scores, ServerMessage, Side, Winner};
use pong_settings::AgentSettings;
use pong_sim::Policy;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commander::PaddleCommander;
use crate::connection::{Connection, Incoming};
use crate::errors::{AgentError, RecvError};
use crate::observation;

/// Agent configuration.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// `{ws|wss}://host:port` of the game service.
    pub base_url: String,
    /// Wait this long for a frame before sending a keepalive ping.
    pub receive_timeout: Duration,
    /// Consecutive undecodable frames tolerated; `0` tolerates any number.
    pub max_decode_errors: u32,
    /// Connect retry policy.
    pub retry: RetryConfig,
    /// Paddle to steer until the server assigns one.
    pub side: Side,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default())
    }
}

impl AgentConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            base_url: settings.base_url(),
            receive_timeout: Duration::from_millis(settings.receive_timeout_ms),
            max_decode_errors: settings.max_decode_errors,
            retry: settings.retry.clone(),
            side: Side::Right,
        }
    }

    /// WebSocket endpoint of a session.
    pub fn endpoint(&self, session_id: &str) -> String {
        format!("{}/ws/{session_id}", self.base_url.trim_end_matches('/'))
    }
}

/// Where the agent is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    /// Not started.
    Idle,
    /// Opening the connection.
    Connecting,
    /// Connected, game not started yet.
    Connected,
    /// Exchanging states and commands.
    Playing,
    /// Done; the connection is closed.
    Stopped,
}

/// Why the loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A `state` reported the round finished.
    GameFinished,
    /// The server sent `game_over`.
    GameOver,
    /// The server sent `error`.
    ServerError(String),
    /// The server closed the connection.
    ConnectionClosed,
    /// Reading or writing failed.
    TransportError(String),
    /// Too many consecutive undecodable frames.
    DecodeErrors,
    /// The cancellation token fired.
    Cancelled,
}

/// Summary of one [`AgentPlayer::play`] run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayOutcome {
    /// Session played.
    pub session_id: String,
    /// Why the loop ended.
    pub reason: StopReason,
    /// Last known scores.
    pub scores: Scores,
    /// Winner, when the round finished.
    pub winner: Option<Winner>,
    /// `state` frames received.
    pub ticks: u64,
    /// Paddle commands sent.
    pub commands_sent: u64,
    /// Keepalive pings sent, including the initial one.
    pub pings_sent: u64,
}

impl PlayOutcome {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_owned(),
            reason: StopReason::ConnectionClosed,
            scores: Scores::default(),
            winner: None,
            ticks: 0,
            commands_sent: 0,
            pings_sent: 0,
        }
    }

    /// The round ran to completion.
    pub fn is_complete(&self) -> bool {
        matches!(self.reason, StopReason::GameFinished | StopReason::GameOver)
    }
}

/// Builds a policy for the paddle the agent steers.
pub type PolicyFactory<P> = Box<dyn Fn(Side) -> P + Send + Sync>;

/// Plays one session at a time with a decision function.
pub struct AgentPlayer<P> {
    config: AgentConfig,
    policy: P,
    factory: Option<PolicyFactory<P>>,
    cancel: CancellationToken,
    state: AgentState,
}

impl<P: Policy> AgentPlayer<P> {
    /// New idle agent.
    pub fn new(config: AgentConfig, policy: P) -> Self {
        Self {
            config,
            policy,
            factory: None,
            cancel: CancellationToken::new(),
            state: AgentState::Idle,
        }
    }

    /// New idle agent whose policy is built for its paddle.
    ///
    /// The policy starts out built for `config.side` and is rebuilt when the
    /// server assigns a different side.
    pub fn for_side<F>(config: AgentConfig, build: F) -> Self
    where
        F: Fn(Side) -> P + Send + Sync + 'static,
    {
        let policy = build(config.side);
        let mut agent = Self::new(config, policy);
        agent.factory = Some(Box::new(build));
        agent
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the agent at its next suspension point.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Lifecycle state.
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Connect to `session_id` and play until the loop stops.
    ///
    /// Only a failed connect is an error; everything after that is reported
    /// through [`PlayOutcome::reason`].
    pub async fn play(&mut self, session_id: &str) -> Result<PlayOutcome, AgentError> {
        self.state = AgentState::Connecting;
        let url = self.config.endpoint(session_id);
        info!(session_id, url = %url, policy = self.policy.name(), "agent connecting");

        let mut conn =
            match Connection::connect_with_retry(&url, &self.config.retry, &self.cancel).await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(session_id, error = %e, "agent failed to connect");
                    self.state = AgentState::Stopped;
                    return Err(e.into());
                }
            };
        self.state = AgentState::Connected;

        let outcome = self.run(&mut conn, session_id).await;

        conn.close().await;
        self.state = AgentState::Stopped;
        info!(
            session_id,
            reason = ?outcome.reason,
            score_ai = outcome.scores.left,
            score_player = outcome.scores.right,
            ticks = outcome.ticks,
            "agent stopped"
        );
        Ok(outcome)
    }

    async fn run(&mut self, conn: &mut Connection, session_id: &str) -> PlayOutcome {
        let mut outcome = PlayOutcome::new(session_id);
        let mut commander = PaddleCommander::new(self.config.side);

        for message in [ClientMessage::Ping, ClientMessage::Start] {
            if let Err(e) = conn.send(&message).await {
                outcome.reason = StopReason::TransportError(e.to_string());
                return outcome;
            }
        }
        outcome.pings_sent += 1;
        conn.mark_playing();
        self.state = AgentState::Playing;

        let mut decode_errors = 0u32;
        outcome.reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let incoming = tokio::select! {
                () = self.cancel.cancelled() => break StopReason::Cancelled,
                incoming = conn.receive_with_timeout(self.config.receive_timeout) => incoming,
            };

            match incoming {
                Ok(Incoming::Timeout) => {
                    if !conn.is_open() {
                        break StopReason::ConnectionClosed;
                    }
                    debug!(session_id, "no frame within receive timeout, sending keepalive");
                    if let Err(e) = conn.send(&ClientMessage::Ping).await {
                        break StopReason::TransportError(e.to_string());
                    }
                    outcome.pings_sent += 1;
                }
                Ok(Incoming::Message(message)) => {
                    decode_errors = 0;
                    if let Some(reason) = self
                        .handle(message, conn, &mut commander, &mut outcome)
                        .await
                    {
                        break reason;
                    }
                }
                Err(RecvError::Decode(e)) => {
                    decode_errors += 1;
                    warn!(session_id, error = %e, consecutive = decode_errors, "ignoring undecodable frame");
                    let limit = self.config.max_decode_errors;
                    if limit > 0 && decode_errors >= limit {
                        break StopReason::DecodeErrors;
                    }
                }
                Err(RecvError::Closed) => {
                    info!(session_id, "server closed the connection");
                    break StopReason::ConnectionClosed;
                }
                Err(RecvError::Transport(e)) => {
                    warn!(session_id, error = %e, "transport error");
                    break StopReason::TransportError(e.to_string());
                }
            }
        };
        conn.mark_idle();
        outcome
    }

    async fn handle(
        &mut self,
        message: ServerMessage,
        conn: &mut Connection,
        commander: &mut PaddleCommander,
        outcome: &mut PlayOutcome,
    ) -> Option<StopReason> {
        match message {
            ServerMessage::Connected { assigned_side, .. } => {
                if let Some(side) = assigned_side {
                    if side != commander.side() {
                        if let Some(build) = &self.factory {
                            self.policy = build(side);
                        }
                    }
                    commander.set_side(side);
                }
                info!(session_id = %outcome.session_id, side = commander.side().as_str(), "assigned paddle");
                None
            }
            ServerMessage::State { data } => self.on_state(&data, conn, commander, outcome).await,
            ServerMessage::GameOver {
                winner,
                scores,
                score_ai,
                score_player,
            } => {
                outcome.scores = if scores == Scores::default() {
                    Scores {
                        left: score_ai,
                        right: score_player,
                    }
                } else {
                    scores
                };
                outcome.winner = Some(winner.unwrap_or_else(|| outcome.scores.winner()));
                info!(session_id = %outcome.session_id, winner = ?outcome.winner, "game over");
                Some(StopReason::GameOver)
            }
            ServerMessage::Error { message } => {
                warn!(session_id = %outcome.session_id, %message, "server error");
                Some(StopReason::ServerError(message))
            }
            ServerMessage::Reset { .. } => {
                debug!(session_id = %outcome.session_id, "server reset the game");
                None
            }
            ServerMessage::Pong | ServerMessage::Unknown => None,
        }
    }

    async fn on_state(
        &self,
        data: &Value,
        conn: &mut Connection,
        commander: &mut PaddleCommander,
        outcome: &mut PlayOutcome,
    ) -> Option<StopReason> {
        outcome.ticks += 1;

        if observation::is_finished(data) {
            outcome.scores = observation::extract_scores(data);
            outcome.winner = Some(outcome.scores.winner());
            info!(
                session_id = %outcome.session_id,
                score_ai = outcome.scores.left,
                score_player = outcome.scores.right,
                "game finished"
            );
            return Some(StopReason::GameFinished);
        }
        if observation::status(data) != Some(GameStatus::Playing) {
            return None;
        }

        let obs = observation::extract_observation(data);
        let action = self.policy.predict(&obs);
        let command = commander.command(action)?;
        if let Err(e) = conn.send(&command).await {
            return Some(StopReason::TransportError(e.to_string()));
        }
        outcome.commands_sent += 1;
        None
    }
}

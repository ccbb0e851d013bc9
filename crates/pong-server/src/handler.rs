//! Game session handler: one task per WebSocket connection.
//!
//! 1. Claims the session (a second connection gets an `error` and is closed)
//! 2. Resets the game and sends `connected`
//! 3. Answers client frames; after `start`, also ticks in real time
//! 4. On disconnect, deletion or shutdown, releases the session and closes

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use pong_core::protocol::{decode_bytes, decode_client};
use pong_core::{ClientMessage, DecodeError, ServerMessage, Side};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::connection::{GameConnection, SEND_QUEUE_CAPACITY};
use crate::metrics::{
    GAME_SESSIONS_FINISHED_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_REJECTED_TOTAL, WS_CONNECTIONS_TOTAL, WS_DECODE_ERRORS_TOTAL,
    WS_MESSAGES_DROPPED_TOTAL,
};
use crate::registry::SessionEntry;
use crate::service::{CLIENT_SIDE, GameService};
use crate::session::{GameSession, Tick};

/// How long the writer may take to flush queued frames after the loop ends.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Message sent to a connection that finds its session already owned.
pub const ALREADY_BOUND: &str = "session already has an active connection";

/// Why the handler loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame or the stream ended.
    ClientClosed,
    /// Read error on the socket.
    Transport,
    /// The writer could not keep up or went away.
    SendFailed,
    /// Too many consecutive undecodable frames.
    DecodeErrors,
    /// The session was deleted from the registry.
    Deleted,
    /// Server shutdown.
    Shutdown,
}

impl CloseReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::Transport => "transport_error",
            Self::SendFailed => "send_failed",
            Self::DecodeErrors => "decode_errors",
            Self::Deleted => "session_deleted",
            Self::Shutdown => "server_shutdown",
        }
    }

    /// Final `error` frame for server-initiated teardown.
    fn farewell(self) -> Option<ServerMessage> {
        match self {
            Self::Deleted => Some(ServerMessage::error("session deleted")),
            Self::Shutdown => Some(ServerMessage::error("server shutting down")),
            Self::DecodeErrors => Some(ServerMessage::error("too many invalid frames")),
            Self::ClientClosed | Self::Transport | Self::SendFailed => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message dispatch
// ─────────────────────────────────────────────────────────────────────────────

/// Apply one client frame to the game and return the frames to send back.
pub fn respond(game: &mut GameSession, side: Side, msg: ClientMessage) -> Vec<ServerMessage> {
    match msg {
        ClientMessage::Ping => vec![ServerMessage::Pong],
        ClientMessage::Start => vec![ServerMessage::state(&game.start())],
        ClientMessage::Paddle { paddle, direction } => {
            if paddle == side {
                game.set_player_direction(direction);
                Vec::new()
            } else {
                vec![ServerMessage::error(format!(
                    "paddle {} is not assigned to this connection",
                    paddle.as_str()
                ))]
            }
        }
        ClientMessage::Move { action } => tick_messages(&game.step(action)),
        ClientMessage::Reset => vec![ServerMessage::reset(&game.reset())],
        ClientMessage::Unknown => Vec::new(),
    }
}

/// `state`, followed by `game_over` when the round just finished.
pub fn tick_messages(tick: &Tick) -> Vec<ServerMessage> {
    let mut out = vec![ServerMessage::state(&tick.state)];
    if tick.finished {
        counter!(GAME_SESSIONS_FINISHED_TOTAL).increment(1);
        out.push(ServerMessage::game_over(tick.state.scores));
    }
    out
}

/// Decode a text or binary frame. `None` for control frames.
fn decode_frame(msg: &Message) -> Option<Result<ClientMessage, DecodeError>> {
    match msg {
        Message::Text(text) => Some(decode_client(text.as_str())),
        Message::Binary(data) => Some(decode_bytes(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Run the protocol for one connection bound to `entry`.
#[instrument(skip_all, fields(session_id = %entry.id(), connection_id = %connection_id))]
pub async fn run_game_session(
    ws: WebSocket,
    connection_id: String,
    entry: Arc<SessionEntry>,
    service: Arc<GameService>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    if !entry.try_bind() {
        warn!("rejecting second connection to a bound session");
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        let _ = ws_tx
            .send(Message::Text(ServerMessage::error(ALREADY_BOUND).to_json().into()))
            .await;
        let _ = ws_tx.send(close_message(close_code::POLICY)).await;
        service.release_connection();
        return;
    }

    let (send_tx, mut send_rx) = mpsc::channel::<String>(SEND_QUEUE_CAPACITY);
    let connection = GameConnection::new(connection_id, entry.id().to_owned(), send_tx);

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Outbound forwarder: drains the queue, then sends a close frame.
    let mut outbound = tokio::spawn(async move {
        while let Some(text) = send_rx.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(close_message(close_code::NORMAL)).await;
        let _ = ws_tx.close().await;
    });

    let initial = entry.game().reset();
    let _ = connection.send(&ServerMessage::connected(entry.id(), CLIENT_SIDE, &initial));

    let reason = session_loop(
        &mut ws_rx,
        &connection,
        &entry,
        service.config().tick_interval(),
        service.config().max_decode_errors,
        &shutdown,
    )
    .await;

    if let Some(farewell) = reason.farewell() {
        let _ = connection.send(&farewell);
    }

    let _ = service.registry().delete_if_same(entry.id(), &entry);
    entry.unbind();
    service.release_connection();

    let stats = record_disconnect(&connection, reason);

    // Dropping the connection closes the queue; the forwarder then closes the socket.
    drop(connection);
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut outbound).await.is_err() {
        outbound.abort();
    }

    info!(
        reason = reason.as_str(),
        dropped = stats.dropped,
        duration_ms = stats.age.as_millis(),
        "client disconnected"
    );
}

/// Final per-connection numbers, taken at teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisconnectStats {
    /// Outbound frames dropped over the connection's lifetime.
    pub dropped: u64,
    /// Time since the connection was accepted.
    pub age: Duration,
}

/// Record teardown metrics for `connection`.
fn record_disconnect(connection: &GameConnection, reason: CloseReason) -> DisconnectStats {
    let stats = DisconnectStats {
        dropped: connection.drop_count(),
        age: connection.age(),
    };
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS, "reason" => reason.as_str())
        .record(stats.age.as_secs_f64());
    if stats.dropped > 0 {
        counter!(WS_MESSAGES_DROPPED_TOTAL).increment(stats.dropped);
    }
    stats
}

async fn session_loop<S>(
    ws_rx: &mut S,
    connection: &GameConnection,
    entry: &SessionEntry,
    tick_interval: Duration,
    max_decode_errors: u32,
    shutdown: &CancellationToken,
) -> CloseReason
where
    S: futures::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let deleted = entry.closed();
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut decode_errors = 0u32;

    loop {
        let ticking = entry.game().is_playing();

        let outgoing = tokio::select! {
            () = shutdown.cancelled() => return CloseReason::Shutdown,
            () = deleted.cancelled() => return CloseReason::Deleted,
            _ = ticker.tick(), if ticking => {
                entry.game().tick().map(|tick| tick_messages(&tick)).unwrap_or_default()
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Close(_))) | None => return CloseReason::ClientClosed,
                Some(Err(e)) => {
                    debug!(error = %e, "websocket read failed");
                    return CloseReason::Transport;
                }
                Some(Ok(msg)) => match decode_frame(&msg) {
                    None => Vec::new(),
                    Some(Ok(client_msg)) => {
                        decode_errors = 0;
                        debug!(?client_msg, "client message");
                        let out = respond(&mut entry.game(), CLIENT_SIDE, client_msg);
                        if !ticking && entry.game().is_playing() {
                            ticker.reset();
                        }
                        out
                    }
                    Some(Err(e)) => {
                        decode_errors += 1;
                        counter!(WS_DECODE_ERRORS_TOTAL).increment(1);
                        warn!(error = %e, consecutive = decode_errors, "undecodable client frame");
                        let reply = ServerMessage::error(e.to_string());
                        if max_decode_errors > 0 && decode_errors >= max_decode_errors {
                            let _ = connection.send(&reply);
                            return CloseReason::DecodeErrors;
                        }
                        vec![reply]
                    }
                },
            },
        };

        if !connection.send_all(&outgoing) {
            return CloseReason::SendFailed;
        }
    }
}

fn close_message(code: u16) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: "".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pong_core::{Action, GameStatus, Observation, Scores, Winner};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use pong_sim::{EngineConfig, PongEngine, TrackingPolicy};

    use crate::registry::SessionRegistry;

    fn game() -> GameSession {
        GameSession::new(
            Box::new(PongEngine::new(EngineConfig {
                seed: Some(2),
                ..EngineConfig::default()
            })),
            Arc::new(TrackingPolicy::new(Side::Left)),
        )
    }

    fn short_game() -> GameSession {
        GameSession::new(
            Box::new(PongEngine::new(EngineConfig {
                paddle_height: 1.0,
                winning_score: 1,
                seed: Some(2),
                ..EngineConfig::default()
            })),
            Arc::new(|_: &Observation| Action::Up),
        )
    }

    #[test]
    fn ping_yields_pong() {
        let out = respond(&mut game(), Side::Right, ClientMessage::Ping);
        assert_eq!(out, vec![ServerMessage::Pong]);
    }

    #[test]
    fn start_yields_playing_state() {
        let mut g = game();
        let out = respond(&mut g, Side::Right, ClientMessage::Start);
        assert_eq!(out.len(), 1);
        let ServerMessage::State { data } = &out[0] else {
            panic!("expected state, got {:?}", out[0]);
        };
        assert_eq!(data["status"], "playing");
        assert_eq!(data["game_over"], false);
        assert!(g.is_playing());
    }

    #[test]
    fn paddle_for_own_side_sets_direction_silently() {
        let mut g = game();
        let out = respond(
            &mut g,
            Side::Right,
            ClientMessage::Paddle {
                paddle: Side::Right,
                direction: Action::Down,
            },
        );
        assert!(out.is_empty());
        assert_eq!(g.player_direction(), Action::Down);
    }

    #[test]
    fn paddle_for_other_side_is_an_error() {
        let mut g = game();
        let out = respond(
            &mut g,
            Side::Right,
            ClientMessage::Paddle {
                paddle: Side::Left,
                direction: Action::Up,
            },
        );
        assert!(matches!(&out[..], [ServerMessage::Error { message }] if message.contains("left")));
        assert_eq!(g.player_direction(), Action::Stop);
    }

    #[test]
    fn move_yields_state() {
        let out = respond(&mut game(), Side::Right, ClientMessage::Move { action: Action::Up });
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind(), "state");
    }

    #[test]
    fn move_to_the_end_yields_state_then_game_over_once() {
        let mut g = short_game();
        let mut finals = Vec::new();
        for _ in 0..10_000 {
            let out = respond(&mut g, Side::Right, ClientMessage::Move { action: Action::Down });
            if out.len() == 2 {
                finals = out;
                break;
            }
        }
        let [ServerMessage::State { data }, ServerMessage::GameOver { winner, scores, score_ai, score_player }] =
            &finals[..]
        else {
            panic!("expected state + game_over, got {finals:?}");
        };
        assert_eq!(data["game_over"], true);
        assert_eq!(data["status"], "finished");
        assert_eq!(*scores, Scores { left: 1, right: 0 });
        assert_eq!(*winner, Some(Winner::Ai));
        assert_eq!((*score_ai, *score_player), (1, 0));

        let after = respond(&mut g, Side::Right, ClientMessage::Move { action: Action::Down });
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn reset_yields_zeroed_state() {
        let mut g = short_game();
        let _ = respond(&mut g, Side::Right, ClientMessage::Move { action: Action::Up });
        let out = respond(&mut g, Side::Right, ClientMessage::Reset);
        let [ServerMessage::Reset { state }] = &out[..] else {
            panic!("expected reset, got {out:?}");
        };
        assert_eq!(state["score_ai"], 0);
        assert_eq!(state["score_player"], 0);
        assert_eq!(state["game_over"], false);
        assert_eq!(g.status(), GameStatus::Waiting);
    }

    #[test]
    fn unknown_is_ignored() {
        assert!(respond(&mut game(), Side::Right, ClientMessage::Unknown).is_empty());
    }

    #[test]
    fn control_frames_are_not_decoded() {
        assert!(decode_frame(&Message::Ping(Vec::new().into())).is_none());
        assert!(decode_frame(&Message::Text(r#"{"type":"ping"}"#.into())).is_some());
        assert!(matches!(
            decode_frame(&Message::Binary(vec![0xff, 0xfe].into())),
            Some(Err(DecodeError::NotUtf8))
        ));
    }

    #[test]
    fn farewell_only_for_server_side_teardown() {
        assert!(CloseReason::Deleted.farewell().is_some());
        assert!(CloseReason::Shutdown.farewell().is_some());
        assert!(CloseReason::DecodeErrors.farewell().is_some());
        assert!(CloseReason::ClientClosed.farewell().is_none());
        assert!(CloseReason::Transport.farewell().is_none());
    }

    fn text(frame: &str) -> Result<Message, axum::Error> {
        Ok(Message::Text(frame.into()))
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(frame);
        }
        out
    }

    #[tokio::test]
    async fn session_loop_closes_after_consecutive_decode_errors() {
        let registry = SessionRegistry::new(Arc::new(game));
        let entry = registry.create_or_get("s1");
        let (tx, mut rx) = mpsc::channel(16);
        let connection = GameConnection::new("c1".into(), "s1".into(), tx);
        let mut frames = futures::stream::iter(vec![
            text("garbage"),
            text(r#"{"type":"ping"}"#),
            text("garbage"),
            text("{"),
            text("not json either"),
            text(r#"{"type":"ping"}"#),
        ]);

        let reason = session_loop(
            &mut frames,
            &connection,
            &entry,
            Duration::from_millis(50),
            3,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(reason, CloseReason::DecodeErrors);
        let sent = drain(&mut rx);
        let kinds: Vec<&str> = sent
            .iter()
            .map(|f| if f.contains(r#""type":"pong""#) { "pong" } else { "error" })
            .collect();
        assert_eq!(kinds, ["error", "pong", "error", "error", "error"]);
    }

    #[tokio::test]
    async fn session_loop_without_decode_cap_keeps_reading() {
        let registry = SessionRegistry::new(Arc::new(game));
        let entry = registry.create_or_get("s1");
        let (tx, mut rx) = mpsc::channel(16);
        let connection = GameConnection::new("c1".into(), "s1".into(), tx);
        let mut frames = futures::stream::iter(vec![text("a"), text("b"), text("c"), text("d")]);

        let reason = session_loop(
            &mut frames,
            &connection,
            &entry,
            Duration::from_millis(50),
            0,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(reason, CloseReason::ClientClosed);
        assert_eq!(drain(&mut rx).len(), 4);
    }

    #[tokio::test]
    async fn record_disconnect_reports_drops_and_age() {
        let (tx, _rx) = mpsc::channel(1);
        let connection = GameConnection::new("c1".into(), "s1".into(), tx);
        assert!(connection.send(&ServerMessage::Pong));
        assert!(!connection.send(&ServerMessage::Pong));
        assert!(!connection.send(&ServerMessage::Pong));
        tokio::time::sleep(Duration::from_millis(5)).await;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let stats = metrics::with_local_recorder(&recorder, || {
            record_disconnect(&connection, CloseReason::SendFailed)
        });

        assert_eq!(stats.dropped, 2);
        assert!(stats.age >= Duration::from_millis(5));
        let rendered = crate::metrics::render(&handle);
        assert!(rendered.contains("ws_messages_dropped_total 2"));
        assert!(rendered.contains("ws_connection_duration_seconds"));
        assert!(rendered.contains(r#"reason="send_failed""#));
    }
}

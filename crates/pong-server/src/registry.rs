//! Session registry: id → live game session.
//!
//! Creation is an atomic insert-if-absent, so concurrent first references to
//! the same id share one session. Entries are never overwritten; a deleted id
//! can be created again as a fresh entry, and handlers remove only the entry
//! they were bound to.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::GameSession;

/// Builds the game for a newly created session.
pub type SessionFactory = Arc<dyn Fn() -> GameSession + Send + Sync>;

/// One registered session.
pub struct SessionEntry {
    id: String,
    created_at: DateTime<Utc>,
    game: Mutex<GameSession>,
    bound: AtomicBool,
    closed: CancellationToken,
}

impl SessionEntry {
    fn new(id: String, game: GameSession) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            game: Mutex::new(game),
            bound: AtomicBool::new(false),
            closed: CancellationToken::new(),
        }
    }

    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the entry was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Lock the game state. Never hold the guard across an `.await`.
    pub fn game(&self) -> MutexGuard<'_, GameSession> {
        self.game.lock()
    }

    /// Claim the session for a connection. Returns `false` if already claimed.
    pub fn try_bind(&self) -> bool {
        self.bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the claim taken by [`try_bind`](Self::try_bind).
    pub fn unbind(&self) {
        self.bound.store(false, Ordering::Release);
    }

    /// Whether a connection currently owns the session.
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Cancelled when the entry is deleted from the registry.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Whether the entry has been deleted.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Listing row for this entry.
    pub fn summary(&self) -> SessionSummary {
        let game = self.game();
        let scores = game.scores();
        SessionSummary {
            session_id: self.id.clone(),
            created_at: self.created_at.to_rfc3339(),
            game_over: game.is_finished(),
            score_ai: scores.left,
            score_player: scores.right,
        }
    }
}

/// Row of `GET /sessions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Session id.
    pub session_id: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Round finished.
    pub game_over: bool,
    /// Left score.
    pub score_ai: u32,
    /// Right score.
    pub score_player: u32,
}

/// Concurrent map of live sessions.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionEntry>>,
    factory: SessionFactory,
}

impl SessionRegistry {
    /// Create an empty registry that builds games with `factory`.
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            sessions: DashMap::new(),
            factory,
        }
    }

    /// Return the entry for `id`, creating it if absent.
    pub fn create_or_get(&self, id: &str) -> Arc<SessionEntry> {
        match self.sessions.entry(id.to_owned()) {
            Entry::Occupied(existing) => Arc::clone(existing.get()),
            Entry::Vacant(slot) => {
                let entry = Arc::new(SessionEntry::new(id.to_owned(), (self.factory)()));
                let _ = slot.insert(Arc::clone(&entry));
                info!(session_id = id, "session created");
                entry
            }
        }
    }

    /// Look up an entry.
    pub fn get(&self, id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.get(id).map(|e| Arc::clone(e.value()))
    }

    /// Remove an entry and signal its bound handler to close.
    pub fn delete(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, entry)) => {
                entry.closed.cancel();
                info!(session_id = id, "session deleted");
                true
            }
            None => false,
        }
    }

    /// Remove `id` only if it still maps to `entry`.
    pub fn delete_if_same(&self, id: &str, entry: &Arc<SessionEntry>) -> bool {
        let removed = self
            .sessions
            .remove_if(id, |_, current| Arc::ptr_eq(current, entry))
            .is_some();
        if removed {
            entry.closed.cancel();
            debug!(session_id = id, "session released by its handler");
        }
        removed
    }

    /// Summaries of all sessions, ordered by creation time.
    pub fn list(&self) -> Vec<SessionSummary> {
        let entries: Vec<Arc<SessionEntry>> =
            self.sessions.iter().map(|e| Arc::clone(e.value())).collect();
        let mut rows: Vec<(DateTime<Utc>, SessionSummary)> = entries
            .iter()
            .map(|entry| (entry.created_at, entry.summary()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.session_id.cmp(&b.1.session_id)));
        rows.into_iter().map(|(_, row)| row).collect()
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session exists.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pong_core::{Action, Side};
    use pong_sim::{EngineConfig, PongEngine, TrackingPolicy};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(|| {
            GameSession::new(
                Box::new(PongEngine::new(EngineConfig {
                    seed: Some(1),
                    ..EngineConfig::default()
                })),
                Arc::new(TrackingPolicy::new(Side::Left)),
            )
        }))
    }

    #[test]
    fn create_or_get_is_idempotent() {
        let reg = registry();
        let a = reg.create_or_get("s1");
        let b = reg.create_or_get("s1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn create_or_get_never_overwrites() {
        let reg = registry();
        let a = reg.create_or_get("s1");
        let _ = a.game().step(Action::Up);
        let b = reg.create_or_get("s1");
        assert_eq!(b.game().status(), pong_core::GameStatus::Playing);
    }

    #[test]
    fn concurrent_creation_yields_one_entry() {
        let reg = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || reg.create_or_get("shared"))
            })
            .collect();
        let entries: Vec<Arc<SessionEntry>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(entries.iter().all(|e| Arc::ptr_eq(e, &entries[0])));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn get_missing_is_none() {
        assert!(registry().get("nope").is_none());
    }

    #[test]
    fn delete_removes_and_signals() {
        let reg = registry();
        let entry = reg.create_or_get("s1");
        let closed = entry.closed();
        assert!(reg.delete("s1"));
        assert!(closed.is_cancelled());
        assert!(entry.is_closed());
        assert!(reg.get("s1").is_none());
        assert!(!reg.delete("s1"));
    }

    #[test]
    fn delete_if_same_spares_newer_entry() {
        let reg = registry();
        let old = reg.create_or_get("s1");
        assert!(reg.delete("s1"));
        let newer = reg.create_or_get("s1");

        assert!(!reg.delete_if_same("s1", &old));
        assert!(reg.get("s1").is_some());
        assert!(!newer.is_closed());

        assert!(reg.delete_if_same("s1", &newer));
        assert!(reg.is_empty());
    }

    #[test]
    fn bind_is_exclusive() {
        let reg = registry();
        let entry = reg.create_or_get("s1");
        assert!(entry.try_bind());
        assert!(!entry.try_bind());
        assert!(entry.is_bound());
        entry.unbind();
        assert!(entry.try_bind());
    }

    #[test]
    fn list_reports_scores_and_state() {
        let reg = registry();
        let _ = reg.create_or_get("a");
        let _ = reg.create_or_get("b");
        let rows = reg.list();
        assert_eq!(rows.len(), 2);
        let ids: Vec<&str> = rows.iter().map(|r| r.session_id.as_str()).collect();
        assert!(ids.contains(&"a") && ids.contains(&"b"));
        assert!(rows.iter().all(|r| !r.game_over && r.score_ai == 0 && r.score_player == 0));
        assert!(rows.iter().all(|r| DateTime::parse_from_rfc3339(&r.created_at).is_ok()));
    }
}

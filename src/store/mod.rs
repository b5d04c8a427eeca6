use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::assistant::intent::Intent;
use crate::types::Turn;

/// One ongoing conversation: an append-only transcript plus the label the
/// classifier resolved for its most recent human turn.
#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub turns: Vec<Turn>,
    pub last_intent: Option<Intent>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// In-memory session store. Sessions are created lazily on first reference
/// and live for the process lifetime.
///
/// The map is held behind an async RwLock only for map operations, so calls
/// for distinct session ids never block each other. Same-session turn
/// ordering is enforced with the per-key locks from `lock()` — the
/// orchestrator holds one for the whole classify/dispatch/append span.
pub struct SessionStore {
    max_turns: usize,
    sessions: RwLock<HashMap<String, Session>>,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    /// `max_turns` is the retention bound: once a transcript exceeds it,
    /// the oldest turns roll off.
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            sessions: RwLock::new(HashMap::new()),
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of the session, creating it if this id is unseen.
    pub async fn get_or_create(&self, id: &str) -> Session {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(id) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| Session {
                id: id.to_string(),
                turns: Vec::new(),
                last_intent: None,
                created_at: chrono::Utc::now(),
            })
            .clone()
    }

    /// Append a turn, creating the session if needed. Oldest turns are
    /// drained once the transcript exceeds the retention bound.
    pub async fn append(&self, id: &str, turn: Turn) {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.to_string()).or_insert_with(|| Session {
            id: id.to_string(),
            turns: Vec::new(),
            last_intent: None,
            created_at: chrono::Utc::now(),
        });
        session.turns.push(turn);
        if session.turns.len() > self.max_turns {
            let drain_count = session.turns.len() - self.max_turns;
            session.turns.drain(..drain_count);
        }
    }

    /// Record the intent resolved for the session's latest human turn.
    pub async fn set_last_intent(&self, id: &str, intent: Intent) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(id) {
            session.last_intent = Some(intent);
        }
    }

    /// Current transcript snapshot, empty if the session is unseen.
    pub async fn transcript(&self, id: &str) -> Vec<Turn> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .map(|s| s.turns.clone())
            .unwrap_or_default()
    }

    /// Per-session mutual-exclusion handle. Holding the guard serializes
    /// transcript mutations for one session without touching any other.
    pub async fn lock(&self, id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(id) {
                return Arc::clone(lock);
            }
        }

        let mut locks = self.locks.write().await;
        Arc::clone(
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

use std::collections::HashMap;
use std::fmt;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tokio::time::Instant;

use voxrelay_core::SessionState;

/// Stable session identity (monotonic, never reused within a process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// One session's outbound queue sender.
#[derive(Clone)]
pub struct Connection {
    pub tx: mpsc::Sender<Message>,
}

pub struct SessionRecord {
    pub conn: Connection,
    pub state: SessionState,
    pub opened_at: Instant,
    pub last_heartbeat: Instant,
}

/// Arena of live sessions keyed by `SessionId`.
///
/// A session is present until its transport or a send reports it closed.
/// Sessions marked `Closing` stay registered but are never broadcast targets.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionRecord>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, id: SessionId, conn: Connection, now: Instant) {
        self.sessions.insert(
            id,
            SessionRecord {
                conn,
                state: SessionState::Open,
                opened_at: now,
                last_heartbeat: now,
            },
        );
    }

    pub fn remove(&mut self, id: SessionId) -> Option<SessionRecord> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&SessionRecord> {
        self.sessions.get(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Flag `id` as closing so broadcasts skip it until it is removed.
    /// Returns false for unknown sessions.
    pub fn mark_closing(&mut self, id: SessionId) -> bool {
        match self.sessions.get_mut(&id) {
            Some(rec) => {
                rec.state = SessionState::Closing;
                true
            }
            None => false,
        }
    }

    /// Record a heartbeat from `id`. Returns false for unknown sessions.
    pub fn touch(&mut self, id: SessionId, now: Instant) -> bool {
        match self.sessions.get_mut(&id) {
            Some(rec) => {
                rec.last_heartbeat = now;
                true
            }
            None => false,
        }
    }

    /// Open sessions other than `from`, resolved now.
    pub fn others(&self, from: SessionId) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(id, rec)| **id != from && rec.state.is_open())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every open session.
    pub fn all(&self) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(_, rec)| rec.state.is_open())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

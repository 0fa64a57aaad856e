//! Bounded, in-memory conversation buffers keyed by (agent, session).
//!
//! An explicit store object with a defined lifecycle, shared by reference
//! across handlers rather than held as ambient process state. Contents live
//! for the process lifetime only; a restart drops every session.

use outdial_types::ChatTurn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Maximum entries kept per session: 20 turns, i.e. the last 10 exchanges.
pub const SESSION_MAX_TURNS: usize = 20;

/// Identifies one conversation buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub agent_id: i64,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(agent_id: i64, session_id: impl Into<String>) -> Self {
        Self {
            agent_id,
            session_id: session_id.into(),
        }
    }
}

/// Summary of one active session, for the sessions listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
}

/// Shared store of session buffers.
///
/// Uses `std::sync::RwLock` intentionally: all lock acquisitions are brief
/// HashMap operations that never span `.await` points, making a synchronous
/// lock safe and more efficient than `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, Vec<ChatTurn>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the session's history, empty if the session does
    /// not exist. Reading never creates a session.
    pub fn history(&self, key: &SessionKey) -> Vec<ChatTurn> {
        self.sessions
            .read()
            .expect("session lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Appends one user/assistant exchange, creating the session if needed,
    /// then truncates to the most recent [`SESSION_MAX_TURNS`] entries.
    pub fn append_exchange(
        &self,
        key: &SessionKey,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) {
        let mut sessions = self.sessions.write().expect("session lock poisoned");
        let buffer = sessions.entry(key.clone()).or_default();
        buffer.push(ChatTurn::user(user));
        buffer.push(ChatTurn::assistant(assistant));
        if buffer.len() > SESSION_MAX_TURNS {
            let excess = buffer.len() - SESSION_MAX_TURNS;
            buffer.drain(..excess);
        }
    }

    /// Removes a session outright. Returns whether it existed; clearing an
    /// absent session is not an error.
    pub fn clear(&self, key: &SessionKey) -> bool {
        self.sessions
            .write()
            .expect("session lock poisoned")
            .remove(key)
            .is_some()
    }

    /// Lists the active sessions for one agent.
    pub fn sessions_for_agent(&self, agent_id: i64) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().expect("session lock poisoned");
        let mut summaries: Vec<SessionSummary> = sessions
            .iter()
            .filter(|(key, _)| key.agent_id == agent_id)
            .map(|(key, turns)| SessionSummary {
                session_id: key.session_id.clone(),
                message_count: turns.len(),
            })
            .collect();
        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        summaries
    }
}

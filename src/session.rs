//! Chat sessions: one document context plus an ordered transcript.
//!
//! Sessions are independent of the document cache. A session keeps its own
//! copy of the document it is about, so cache expiry never breaks an ongoing
//! conversation, and processing another document in the same session simply
//! switches its context. Sessions live until cleared explicitly.

use crate::output::PageTextMap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Who said it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The document a session is talking about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDocument {
    pub fingerprint: String,
    pub pages: Arc<PageTextMap>,
    pub unresolved: Vec<usize>,
}

#[derive(Debug, Clone)]
struct Session {
    document: Option<SessionDocument>,
    transcript: Vec<ChatTurn>,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            document: None,
            transcript: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Session id → session, safe to share across tasks.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session under a fresh random id.
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Session::new());
        debug!("Created session {}", id);
        id
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Point the session at `document`, creating the session on first use.
    ///
    /// The transcript is kept when the fingerprint is unchanged and reset
    /// when the session switches to a different document.
    pub fn attach_document(&self, session_id: &str, document: SessionDocument) {
        let mut session = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(Session::new);
        let switching = session
            .document
            .as_ref()
            .is_some_and(|d| d.fingerprint != document.fingerprint);
        if switching {
            debug!("Session {} switched document, clearing transcript", session_id);
            session.transcript.clear();
        }
        session.document = Some(document);
    }

    pub fn document(&self, session_id: &str) -> Option<SessionDocument> {
        self.sessions.get(session_id)?.document.clone()
    }

    /// Append a turn, creating the session on first use.
    pub fn push_turn(&self, session_id: &str, turn: ChatTurn) {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(Session::new)
            .transcript
            .push(turn);
    }

    /// Transcript in chronological order; empty for unknown sessions.
    pub fn transcript(&self, session_id: &str) -> Vec<ChatTurn> {
        self.sessions
            .get(session_id)
            .map(|s| s.transcript.clone())
            .unwrap_or_default()
    }

    pub fn created_at(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.sessions.get(session_id).map(|s| s.created_at)
    }

    /// Drop the session, its document context and transcript.
    ///
    /// Returns whether the session existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

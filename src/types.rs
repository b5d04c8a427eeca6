use serde::{Deserialize, Serialize};

use crate::assistant::intent::Intent;

/// Who produced a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Assistant,
}

/// One message in a session transcript. Turns are append-only:
/// never reordered, never removed (beyond the retention bound).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Turn {
    /// Create a human turn with the current timestamp.
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create an assistant turn with the current timestamp.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// The orchestration unit threaded through one in-flight chat request.
///
/// Owns a working copy of the transcript; the session store holds the
/// authoritative one. Not shared across requests — two requests for the
/// same session serialize on the store's per-session lock instead.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub session_id: String,
    pub transcript: Vec<Turn>,
    pub intent: Option<Intent>,
}

impl AgentState {
    pub fn new(session_id: impl Into<String>, transcript: Vec<Turn>) -> Self {
        Self {
            session_id: session_id.into(),
            transcript,
            intent: None,
        }
    }

    /// The most recent human utterance, if any.
    pub fn latest_utterance(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|t| t.role == Role::Human)
            .map(|t| t.content.as_str())
    }
}

/// A streaming event emitted while the assistant composes a reply.
///
/// Wire format (SSE): `event: text|done|error` with a `data` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Text(String),
    Done,
    Error(String),
}

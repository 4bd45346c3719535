//! Conversation state: session state machine and turn history

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Error, Result};

/// Conversational state of a voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nobody is talking
    #[default]
    Idle,
    /// The user is talking
    Listening,
    /// The agent is talking
    Speaking,
}

impl SessionState {
    /// Get allowed transitions from current state
    ///
    /// `Idle` is always reachable (emergency reset); `Idle -> Idle` is an
    /// explicit no-op. Other same-state transitions are rejected.
    pub fn allowed_transitions(&self) -> &'static [SessionState] {
        match self {
            SessionState::Idle => &[SessionState::Listening, SessionState::Idle],
            SessionState::Listening => &[SessionState::Speaking, SessionState::Idle],
            SessionState::Speaking => &[SessionState::Listening, SessionState::Idle],
        }
    }

    /// Check if transition to target state is allowed
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        target == SessionState::Idle || self.allowed_transitions().contains(&target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Listening => "listening",
            SessionState::Speaking => "speaking",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversational exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn id
    pub id: String,
    /// What the user said
    pub user_text: String,
    /// What the agent answered
    pub agent_text: String,
    /// Identifiers of tool calls made during the turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Turn {
    /// Create a turn starting now with a generated id
    pub fn new(user_text: impl Into<String>, agent_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_text: user_text.into(),
            agent_text: agent_text.into(),
            tool_calls: Vec::new(),
            start_time: now,
            end_time: now,
        }
    }

    /// Record a tool call made during the turn
    pub fn with_tool_call(mut self, call_id: impl Into<String>) -> Self {
        self.tool_calls.push(call_id.into());
        self
    }

    /// Stamp the end of the turn
    pub fn finish(mut self) -> Self {
        self.end_time = Utc::now();
        self
    }

    /// Wall-clock duration of the turn
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    metadata: HashMap<String, serde_json::Value>,
    turns: Vec<Turn>,
}

/// Conversation state shared by reference with pipelines
///
/// Safe for concurrent use: every accessor takes an internal lock. History
/// has no cap; callers manage retention.
#[derive(Debug)]
pub struct VoiceSession {
    id: String,
    created_at: DateTime<Utc>,
    inner: RwLock<SessionInner>,
}

impl VoiceSession {
    /// Create a session in the `Idle` state
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            inner: RwLock::new(SessionInner::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state
    }

    /// Move to `to`; the state is left unchanged when the move is rejected
    pub fn transition(&self, to: SessionState) -> Result<()> {
        let mut inner = self.inner.write();
        let from = inner.state;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition { from, to });
        }
        inner.state = to;
        tracing::trace!(session = %self.id, %from, %to, "Session transition");
        Ok(())
    }

    /// Append a turn to the history
    pub fn add_turn(&self, turn: Turn) {
        self.inner.write().turns.push(turn);
    }

    /// Most recent turn, if any
    pub fn last_turn(&self) -> Option<Turn> {
        self.inner.read().turns.last().cloned()
    }

    pub fn turn_count(&self) -> usize {
        self.inner.read().turns.len()
    }

    /// Snapshot of the full history
    pub fn turns(&self) -> Vec<Turn> {
        self.inner.read().turns.clone()
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.inner.write().metadata.insert(key.into(), value.into());
    }

    pub fn metadata(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.read().metadata.get(key).cloned()
    }
}

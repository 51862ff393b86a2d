//! Capped, ordered log of thought events.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::util::{now_string, short_id};

/// Maximum number of entries retained per session.
pub const THOUGHT_STREAM_CAP: usize = 100;

/// Lifecycle of a single thought.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtStatus {
    Running,
    Completed,
    Error,
}

impl ThoughtStatus {
    /// Completed and error entries close a running one.
    pub fn is_terminal(self) -> bool {
        matches!(self, ThoughtStatus::Completed | ThoughtStatus::Error)
    }

    /// Parse the loose status strings agents send through `emit_thought`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => Some(ThoughtStatus::Running),
            "completed" | "complete" | "done" => Some(ThoughtStatus::Completed),
            "error" | "failed" => Some(ThoughtStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ThoughtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThoughtStatus::Running => write!(f, "running"),
            ThoughtStatus::Completed => write!(f, "completed"),
            ThoughtStatus::Error => write!(f, "error"),
        }
    }
}

/// A status or reasoning entry shown on the client's timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThoughtEvent {
    pub id: String,
    pub agent_name: String,
    pub message: String,
    pub status: ThoughtStatus,
    /// RFC 3339, UTC
    pub timestamp: String,
    /// True for reasoning extracted from model output, false for explicit progress reports.
    #[serde(default)]
    pub is_summary: bool,
}

impl ThoughtEvent {
    /// Create a progress entry with a fresh id and timestamp.
    pub fn new(
        agent_name: impl Into<String>,
        message: impl Into<String>,
        status: ThoughtStatus,
    ) -> Self {
        Self {
            id: short_id(),
            agent_name: agent_name.into(),
            message: message.into(),
            status,
            timestamp: now_string(),
            is_summary: false,
        }
    }

    /// Create a completed reasoning-summary entry.
    pub fn summary(agent_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_summary: true,
            ..Self::new(agent_name, message, ThoughtStatus::Completed)
        }
    }
}

/// Sliding window over the most recent thought events.
///
/// # Invariants
/// - `len() <= cap`
/// - Entries stay in insertion order; eviction only removes from the front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ThoughtEvent>", into = "Vec<ThoughtEvent>")]
pub struct ThoughtStream {
    entries: VecDeque<ThoughtEvent>,
    cap: usize,
}

impl ThoughtStream {
    pub fn new() -> Self {
        Self::with_cap(THOUGHT_STREAM_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(THOUGHT_STREAM_CAP)),
            cap: cap.max(1),
        }
    }

    /// Append an entry, evicting the oldest ones past the cap.
    pub fn append(&mut self, event: ThoughtEvent) {
        self.entries.push_back(event);
        while self.entries.len() > self.cap {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::trace!("Evicted thought {} from stream", evicted.id);
            }
        }
    }

    /// Newest running entry for `agent_name`.
    pub fn latest_running(&self, agent_name: &str) -> Option<&ThoughtEvent> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.agent_name == agent_name && e.status == ThoughtStatus::Running)
    }

    /// Update the newest running entry for `agent_name` in place.
    ///
    /// Returns `false` when no such entry exists; the caller decides whether to append.
    pub fn update_latest_running(
        &mut self,
        agent_name: &str,
        status: ThoughtStatus,
        message: &str,
    ) -> bool {
        match self
            .entries
            .iter_mut()
            .rev()
            .find(|e| e.agent_name == agent_name && e.status == ThoughtStatus::Running)
        {
            Some(entry) => {
                entry.status = status;
                entry.message = message.to_string();
                true
            }
            None => false,
        }
    }

    /// Update the entry with the given id in place.
    pub fn update_by_id(&mut self, id: &str, status: ThoughtStatus, message: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.status = status;
                entry.message = message.to_string();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&ThoughtEvent> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThoughtEvent> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ThoughtEvent> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<ThoughtEvent> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for ThoughtStream {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<ThoughtEvent>> for ThoughtStream {
    fn from(events: Vec<ThoughtEvent>) -> Self {
        let mut stream = Self::new();
        for event in events {
            stream.append(event);
        }
        stream
    }
}

impl From<ThoughtStream> for Vec<ThoughtEvent> {
    fn from(stream: ThoughtStream) -> Self {
        stream.entries.into_iter().collect()
    }
}

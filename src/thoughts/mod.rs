//! Live thought stream and delegation tracking for a session.
//!
//! Each session owns one [`SessionState`]:
//! - a capped [`ThoughtStream`] of progress and reasoning entries
//! - a [`DelegationChain`] naming the agent that currently owns execution
//! - a running total of reasoning tokens reported by the model
//!
//! The state is reached through a [`SessionHandle`], which serializes every
//! mutation behind one lock and broadcasts a snapshot afterwards so polling
//! and streaming clients see monotonic progress within a turn.

mod delegation;
mod postprocess;
mod session;
mod stream;

pub use delegation::{DelegationChain, ROOT_AGENT};
pub use postprocess::{Extraction, ModelPhase};
pub use session::{SessionHandle, SessionRegistry, SharedSession};
pub use stream::{ThoughtEvent, ThoughtStatus, ThoughtStream, THOUGHT_STREAM_CAP};

use serde::{Deserialize, Serialize};

/// Result of an `emit` call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmitReceipt {
    pub event_id: String,
    pub count: usize,
}

/// Handle to a running entry created by [`SessionState::emit_scoped`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThoughtToken {
    pub id: String,
    pub agent_name: String,
}

/// Session-scoped execution state exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    thought_stream: ThoughtStream,
    #[serde(default)]
    delegation_chain: DelegationChain,
    #[serde(default = "default_delegated_agent")]
    delegated_agent: String,
    #[serde(default)]
    thinking_tokens_total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_summary_agent: Option<String>,
    #[serde(skip)]
    phase: ModelPhase,
}

fn default_delegated_agent() -> String {
    ROOT_AGENT.to_string()
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            thought_stream: ThoughtStream::new(),
            delegation_chain: DelegationChain::new(),
            delegated_agent: default_delegated_agent(),
            thinking_tokens_total: 0,
            thought_summary: None,
            thought_summary_agent: None,
            phase: ModelPhase::Idle,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thought_stream(&self) -> &ThoughtStream {
        &self.thought_stream
    }

    pub fn delegation_chain(&self) -> &DelegationChain {
        &self.delegation_chain
    }

    pub fn delegated_agent(&self) -> &str {
        &self.delegated_agent
    }

    pub fn thinking_tokens_total(&self) -> u64 {
        self.thinking_tokens_total
    }

    pub fn thought_summary(&self) -> Option<&str> {
        self.thought_summary.as_deref()
    }

    pub fn thought_summary_agent(&self) -> Option<&str> {
        self.thought_summary_agent.as_deref()
    }

    pub fn phase(&self) -> ModelPhase {
        self.phase
    }

    /// Prepare for a new turn.
    ///
    /// A chain left behind by a cancelled or failed turn is discarded here; the
    /// thought stream and token total carry over.
    pub fn begin_turn(&mut self) {
        if !self.delegation_chain.is_empty() {
            tracing::warn!(
                "Discarding stale delegation chain from previous turn: {:?}",
                self.delegation_chain.as_slice()
            );
        }
        self.delegation_chain.clear();
        self.delegated_agent = ROOT_AGENT.to_string();
        self.phase = ModelPhase::Idle;
    }

    /// Lifecycle hook: an agent began processing.
    pub fn on_agent_start(&mut self, agent_name: &str) {
        self.delegation_chain.push(agent_name);
        self.delegated_agent = agent_name.to_string();
    }

    /// Lifecycle hook: an agent finished. Ignored unless `agent_name` is on top.
    pub fn on_agent_end(&mut self, agent_name: &str) {
        if !self.delegation_chain.pop_if_top(agent_name) {
            tracing::debug!(
                "Ignoring end of {} (top is {:?})",
                agent_name,
                self.delegation_chain.top()
            );
        }
        self.delegated_agent = self.delegation_chain.delegated_agent().to_string();
    }

    /// Report progress for `agent_name`.
    ///
    /// Terminal statuses close the newest running entry of that agent in place, or
    /// append a new terminal entry if there is none. With several overlapping running
    /// entries for one agent the newest one is closed, which may not be the one the
    /// caller meant; use [`emit_scoped`](Self::emit_scoped) when that matters.
    pub fn emit(&mut self, agent_name: &str, message: &str, status: ThoughtStatus) -> EmitReceipt {
        if status.is_terminal() {
            let target = self
                .thought_stream
                .latest_running(agent_name)
                .map(|e| e.id.clone());
            if let Some(event_id) = target {
                if self
                    .thought_stream
                    .update_latest_running(agent_name, status, message)
                {
                    return EmitReceipt {
                        event_id,
                        count: self.thought_stream.len(),
                    };
                }
            }
        }

        let event = ThoughtEvent::new(agent_name, message, status);
        let event_id = event.id.clone();
        self.thought_stream.append(event);
        EmitReceipt {
            event_id,
            count: self.thought_stream.len(),
        }
    }

    /// Append a running entry and return a token addressing exactly that entry.
    pub fn emit_scoped(&mut self, agent_name: &str, message: &str) -> ThoughtToken {
        let event = ThoughtEvent::new(agent_name, message, ThoughtStatus::Running);
        let token = ThoughtToken {
            id: event.id.clone(),
            agent_name: agent_name.to_string(),
        };
        self.thought_stream.append(event);
        token
    }

    /// Close the entry behind `token`.
    ///
    /// Returns `true` when updated in place. If the entry has been evicted the
    /// completion is appended as a new entry instead and `false` is returned.
    pub fn complete(&mut self, token: &ThoughtToken, message: &str, status: ThoughtStatus) -> bool {
        if self.thought_stream.update_by_id(&token.id, status, message) {
            return true;
        }
        tracing::debug!(
            "Thought {} no longer in stream, appending completion",
            token.id
        );
        self.thought_stream
            .append(ThoughtEvent::new(&token.agent_name, message, status));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_without_running_entry_appends() {
        let mut state = SessionState::new();
        let before = state.thought_stream().len();
        let receipt = state.emit("X", "done", ThoughtStatus::Completed);
        assert_eq!(state.thought_stream().len(), before + 1);
        assert_eq!(receipt.count, before + 1);
        let last = state.thought_stream().last().unwrap();
        assert_eq!(last.status, ThoughtStatus::Completed);
        assert_eq!(last.id, receipt.event_id);
    }

    #[test]
    fn completion_updates_running_entry_in_place() {
        let mut state = SessionState::new();
        let started = state.emit("X", "start", ThoughtStatus::Running);
        let finished = state.emit("X", "done", ThoughtStatus::Completed);

        assert_eq!(state.thought_stream().len(), 1);
        assert_eq!(started.event_id, finished.event_id);
        let entries: Vec<_> = state
            .thought_stream()
            .iter()
            .filter(|e| e.agent_name == "X")
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, ThoughtStatus::Completed);
        assert_eq!(entries[0].message, "done");
    }

    #[test]
    fn error_status_also_closes_running_entry() {
        let mut state = SessionState::new();
        state.emit("X", "start", ThoughtStatus::Running);
        state.emit("X", "failed", ThoughtStatus::Error);
        assert_eq!(state.thought_stream().len(), 1);
        assert_eq!(
            state.thought_stream().last().map(|e| e.status),
            Some(ThoughtStatus::Error)
        );
    }

    #[test]
    fn running_emits_always_append() {
        let mut state = SessionState::new();
        state.emit("X", "one", ThoughtStatus::Running);
        state.emit("X", "two", ThoughtStatus::Running);
        assert_eq!(state.thought_stream().len(), 2);
    }

    #[test]
    fn scan_based_completion_hits_newest_running_entry() {
        // Known limitation: overlapping running entries for the same agent.
        let mut state = SessionState::new();
        state.emit("X", "first tool", ThoughtStatus::Running);
        state.emit("X", "second tool", ThoughtStatus::Running);
        state.emit("X", "first tool done", ThoughtStatus::Completed);

        let entries = state.thought_stream().to_vec();
        assert_eq!(entries[0].status, ThoughtStatus::Running);
        assert_eq!(entries[1].message, "first tool done");
    }

    #[test]
    fn scoped_completion_targets_exact_entry() {
        let mut state = SessionState::new();
        let first = state.emit_scoped("X", "first tool");
        let _second = state.emit_scoped("X", "second tool");

        assert!(state.complete(&first, "first tool done", ThoughtStatus::Completed));
        let entries = state.thought_stream().to_vec();
        assert_eq!(entries[0].message, "first tool done");
        assert_eq!(entries[0].status, ThoughtStatus::Completed);
        assert_eq!(entries[1].status, ThoughtStatus::Running);
    }

    #[test]
    fn scoped_completion_after_eviction_appends() {
        let mut state = SessionState::new();
        let token = state.emit_scoped("X", "slow tool");
        for i in 0..THOUGHT_STREAM_CAP {
            state.emit("Y", &format!("filler {}", i), ThoughtStatus::Running);
        }
        assert!(state.thought_stream().get(&token.id).is_none());

        assert!(!state.complete(&token, "slow tool done", ThoughtStatus::Completed));
        let last = state.thought_stream().last().unwrap();
        assert_eq!(last.agent_name, "X");
        assert_eq!(last.status, ThoughtStatus::Completed);
        assert_eq!(state.thought_stream().len(), THOUGHT_STREAM_CAP);
    }

    #[test]
    fn lifecycle_hooks_track_delegated_agent() {
        let mut state = SessionState::new();
        state.on_agent_start("A");
        state.on_agent_start("B");
        assert_eq!(state.delegated_agent(), "B");
        state.on_agent_end("B");
        assert_eq!(state.delegated_agent(), "A");
        state.on_agent_end("A");
        assert!(state.delegation_chain().is_empty());
        assert_eq!(state.delegated_agent(), ROOT_AGENT);
    }

    #[test]
    fn mismatched_end_leaves_chain() {
        let mut state = SessionState::new();
        state.on_agent_start("A");
        state.on_agent_end("B");
        assert_eq!(state.delegation_chain().as_slice(), ["A".to_string()]);
        assert_eq!(state.delegated_agent(), "A");
    }

    #[test]
    fn begin_turn_resets_stale_chain_but_keeps_stream() {
        let mut state = SessionState::new();
        state.on_agent_start(ROOT_AGENT);
        state.on_agent_start("research_agent");
        state.emit("research_agent", "searching", ThoughtStatus::Running);

        state.begin_turn();
        assert!(state.delegation_chain().is_empty());
        assert_eq!(state.delegated_agent(), ROOT_AGENT);
        assert_eq!(state.thought_stream().len(), 1);
    }

    #[test]
    fn wire_format_has_expected_fields() {
        let mut state = SessionState::new();
        state.on_agent_start(ROOT_AGENT);
        state.emit(ROOT_AGENT, "planning", ThoughtStatus::Running);

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["delegated_agent"], ROOT_AGENT);
        assert_eq!(value["delegation_chain"], serde_json::json!([ROOT_AGENT]));
        assert_eq!(value["thinking_tokens_total"], 0);
        assert_eq!(value["thought_stream"][0]["message"], "planning");
        assert!(value.get("phase").is_none());

        let back: SessionState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}

//! Stack of agents currently owning execution.

use serde::{Deserialize, Serialize};

/// Label reported when no agent is on the chain.
pub const ROOT_AGENT: &str = "root_agent";

/// Active call stack, root first and deepest worker last.
///
/// # Invariants
/// - Only `push` and a matching `pop_if_top` mutate the chain (plus `clear` between turns).
/// - A pop for a name that is not on top leaves the chain untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DelegationChain {
    chain: Vec<String>,
}

impl DelegationChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, agent_name: impl Into<String>) {
        self.chain.push(agent_name.into());
    }

    /// Pop the top entry if it is `agent_name`. Returns whether anything was popped.
    pub fn pop_if_top(&mut self, agent_name: &str) -> bool {
        if self.chain.last().map(String::as_str) == Some(agent_name) {
            self.chain.pop();
            true
        } else {
            false
        }
    }

    pub fn top(&self) -> Option<&str> {
        self.chain.last().map(String::as_str)
    }

    /// Top of the chain, or the root label when empty.
    pub fn delegated_agent(&self) -> &str {
        self.top().unwrap_or(ROOT_AGENT)
    }

    pub fn clear(&mut self) {
        self.chain.clear();
    }

    pub fn as_slice(&self) -> &[String] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

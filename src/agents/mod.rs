//! Agent team and the delegation runtime.
//!
//! # Agents
//! - **root_agent**: orchestrator, delegates through `transfer_to_agent`
//! - **research_agent**, **analysis_agent**, **summary_agent**: workers with
//!   their own tools
//!
//! A turn starts at the root. Every agent run is bracketed by the session's
//! lifecycle hooks, so the delegation chain always names the agent that
//! currently owns execution.

pub mod roster;
mod runtime;

pub use roster::{find_agent, roster, system_prompt, AgentSpec, ROOT};
pub use runtime::{Orchestrator, TurnOutcome, TRANSFER_TOOL};

use thiserror::Error;

/// Errors that end a turn.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{agent} reached the iteration limit ({limit}) without answering")]
    MaxIterations { agent: String, limit: usize },
}

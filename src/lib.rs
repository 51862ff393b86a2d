//! # Agent Studio
//!
//! Multi-agent backend that streams what its agents are doing while they work.
//!
//! This library provides:
//! - A per-session thought stream and delegation chain, updated by agent
//!   lifecycle hooks, tools and a model output post-processor
//! - An orchestrator that delegates to research, analysis and summary agents
//! - HTTP APIs for login, per-user sessions, user administration, agent runs
//!   and live state over SSE
//!
//! ## Turn Flow
//! 1. A message arrives at `POST /api/sessions/{id}/run`
//! 2. `root_agent` starts and reports its plan with `emit_thought`
//! 3. It transfers work to a worker; the chain grows, worker tools report progress
//! 4. The worker ends, the chain shrinks, the root answers
//! 5. State is saved and the session record updated
//!
//! ## Modules
//! - `thoughts`: thought stream, delegation chain, session handles
//! - `agents`: agent roster and the delegation runtime
//! - `tools`: mock worker tools and `emit_thought`
//! - `llm`: OpenRouter chat completions client
//! - `store`: users, sessions and saved state (SQLite or in-memory)
//! - `auth`: password hashing and tokens
//! - `api`: HTTP routes

pub mod agents;
pub mod api;
pub mod auth;
pub mod config;
pub mod llm;
pub mod store;
pub mod thoughts;
pub mod tools;
pub mod util;

pub use config::Config;

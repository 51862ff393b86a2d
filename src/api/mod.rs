//! HTTP API for Agent Studio.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/auth/login` - Exchange credentials for a token
//! - `GET /api/auth/validate` - Check a token
//! - `POST /api/auth/logout` - Acknowledge logout
//! - `GET|POST /api/sessions` - List or create the caller's sessions
//! - `GET|PUT|DELETE /api/sessions/{id}` - Read, rename or delete a session
//! - `POST /api/sessions/{id}/run` - Run a message through the agents
//! - `GET /api/sessions/{id}/state` - Current thought stream and delegation state
//! - `GET /api/sessions/{id}/stream` - Stream state snapshots via SSE
//! - `GET|POST /api/admin/users` - List or create users (admin)
//! - `PUT|DELETE /api/admin/users/{id}` - Update or delete a user (admin)
//! - `POST /api/admin/users/{id}/reset-password` - Set a new password (admin)

mod admin;
mod agent;
mod auth;
mod error;
mod routes;
mod sessions;
pub mod types;

pub use auth::AuthUser;
pub use error::ApiError;
pub use routes::{build_router, serve, AppState};

//! Per-user chat session CRUD.
//!
//! Sessions are owner-scoped: another user's session answers 404 exactly like
//! a missing one.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::Utc;

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use super::types::{
    CreateSessionRequest, SessionListResponse, SessionResponse, SuccessResponse,
    UpdateSessionRequest,
};
use crate::store::SessionRecord;

pub(crate) fn session_not_found() -> ApiError {
    ApiError::not_found("Session not found")
}

fn default_session_name() -> String {
    format!("New Chat - {}", Utc::now().format("%b %d"))
}

/// Fetch `session_id` if it belongs to `user`.
pub(crate) async fn owned_session(
    state: &AppState,
    session_id: &str,
    user: &AuthUser,
) -> Result<SessionRecord, ApiError> {
    state
        .store
        .get_session(session_id, &user.user_id)
        .await?
        .ok_or_else(session_not_found)
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state.store.list_sessions(&user.user_id).await?;
    Ok(Json(SessionListResponse { sessions }))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    req: Option<Json<CreateSessionRequest>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let name = req
        .and_then(|Json(req)| req.session_name)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(default_session_name);

    let session = state.store.create_session(&user.user_id, &name).await?;
    tracing::info!("User {} created session {}", user.user_id, session.session_id);
    Ok(Json(SessionResponse { session }))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = owned_session(&state, &session_id, &user).await?;
    Ok(Json(SessionResponse { session }))
}

pub async fn update_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .store
        .update_session(&session_id, &user.user_id, req.session_name.as_deref())
        .await?
        .ok_or_else(session_not_found)?;
    Ok(Json(SessionResponse { session }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if !state.store.delete_session(&session_id, &user.user_id).await? {
        return Err(session_not_found());
    }
    state.sessions.remove(&session_id).await;
    tracing::info!("User {} deleted session {}", user.user_id, session_id);
    Ok(Json(SuccessResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_has_month_and_day() {
        let name = default_session_name();
        let suffix = name.strip_prefix("New Chat - ").unwrap();
        let mut parts = suffix.split(' ');
        assert_eq!(parts.next().map(str::len), Some(3));
        assert_eq!(parts.next().map(str::len), Some(2));
    }
}

//! Agent turns and live session state.
//!
//! - `POST /api/sessions/:id/run` runs one user message through the agent team
//! - `GET /api/sessions/:id/state` returns the current state snapshot
//! - `GET /api/sessions/:id/stream` pushes a `state` event after every mutation

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use tokio::sync::broadcast;

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use super::sessions::owned_session;
use super::types::{RunRequest, RunResponse};
use crate::thoughts::{SessionState, SharedSession};
use crate::util::truncate_chars;

const PREVIEW_CHARS: usize = 100;
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Live handle for `session_id`, loading saved state on first use.
async fn live_session(state: &AppState, session_id: &str) -> SharedSession {
    let store = Arc::clone(&state.store);
    let id = session_id.to_string();
    state
        .sessions
        .get_or_load(session_id, || async move {
            match store.load_session_state(&id).await {
                Ok(Some(saved)) => saved,
                Ok(None) => SessionState::new(),
                Err(e) => {
                    tracing::warn!("Failed to load state for session {}: {}", id, e);
                    SessionState::new()
                }
            }
        })
        .await
}

pub async fn run(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let orchestrator = state
        .orchestrator
        .clone()
        .ok_or_else(|| ApiError::Unavailable("No model configured".to_string()))?;
    owned_session(&state, &session_id, &user).await?;
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let session = live_session(&state, &session_id).await;
    let (result, snapshot, saved) = {
        let _turn = session.lock_turn().await;
        tracing::info!("Session {}: running turn for {}", session_id, user.user_id);
        let result = orchestrator.run_turn(&session, &req.message).await;
        let snapshot = session.snapshot().await;
        let saved = match state.store.save_session_state(&session_id, &snapshot).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to save state for session {}: {}", session_id, e);
                false
            }
        };
        (result, snapshot, saved)
    };
    drop(session);

    if saved && state.sessions.release_if_idle(&session_id).await {
        tracing::debug!("Session {}: released idle handle", session_id);
    }
    let outcome = result?;

    state
        .store
        .record_turn(
            &session_id,
            &truncate_chars(&outcome.answer, PREVIEW_CHARS),
            outcome.agents.len() as i64,
        )
        .await?;

    Ok(Json(RunResponse {
        answer: outcome.answer,
        state: snapshot,
    }))
}

pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionState>, ApiError> {
    owned_session(&state, &session_id, &user).await?;
    let session = live_session(&state, &session_id).await;
    Ok(Json(session.snapshot().await))
}

fn state_event(snapshot: &SessionState) -> Option<Event> {
    match Event::default().event("state").json_data(snapshot) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("Failed to encode state event: {}", e);
            None
        }
    }
}

/// Stream state snapshots via SSE, starting with the current one.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    owned_session(&state, &session_id, &user).await?;
    let session = live_session(&state, &session_id).await;
    let mut rx = session.subscribe();
    let initial = session.snapshot().await;
    drop(session);

    let stream = async_stream::stream! {
        if let Some(event) = state_event(&initial) {
            yield Ok(event);
        }

        loop {
            match rx.recv().await {
                Ok(snapshot) => {
                    if let Some(event) = state_event(&snapshot) {
                        yield Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Snapshots are complete states; the next one catches up.
                    tracing::debug!("State stream lagged by {} snapshots", skipped);
                }
                // Session deleted.
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEPALIVE_INTERVAL)
            .text("keepalive"),
    ))
}

//! User management. Every handler requires an admin caller.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};

use super::auth::AuthUser;
use super::error::ApiError;
use super::routes::AppState;
use super::types::{
    CreateUserRequest, ResetPasswordRequest, SuccessResponse, UpdateUserRequest,
    UserListResponse, UserResponse,
};
use crate::auth::hash_password;
use crate::store::{NewUser, UserUpdate};

fn user_not_found() -> ApiError {
    ApiError::not_found("User not found")
}

async fn hash(state: &AppState, password: String) -> Result<String, ApiError> {
    let rounds = state.config.auth.password_hash_rounds;
    tokio::task::spawn_blocking(move || hash_password(&password, rounds))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
) -> Result<Json<UserListResponse>, ApiError> {
    admin.ensure_admin()?;
    let users = state.store.list_users().await?;
    Ok(Json(UserListResponse { users }))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    admin.ensure_admin()?;
    let user_id = req.user_id.trim().to_string();
    if user_id.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("user_id and password are required"));
    }
    if state.store.get_user(&user_id).await?.is_some() {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let password_hash = hash(&state, req.password).await?;
    let user = state
        .store
        .create_user(NewUser {
            user_id,
            password_hash,
            is_admin: req.is_admin,
            is_active: req.is_active,
        })
        .await?;
    tracing::info!("Admin {} created user {}", admin.user_id, user.user_id);
    Ok(Json(UserResponse { user }))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    admin.ensure_admin()?;
    if state.store.get_user(&user_id).await?.is_none() {
        return Err(user_not_found());
    }
    if user_id == admin.user_id && req.is_admin == Some(false) {
        return Err(ApiError::bad_request(
            "Cannot remove your own admin privileges",
        ));
    }

    let update = UserUpdate {
        is_admin: req.is_admin,
        is_active: req.is_active,
    };
    if update.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let user = state
        .store
        .update_user(&user_id, update)
        .await?
        .ok_or_else(user_not_found)?;
    tracing::info!(
        "Admin {} updated user {} (admin={}, active={})",
        admin.user_id,
        user.user_id,
        user.is_admin,
        user.is_active
    );
    Ok(Json(UserResponse { user }))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    admin.ensure_admin()?;
    if state.store.get_user(&user_id).await?.is_none() {
        return Err(user_not_found());
    }
    if req.new_password.is_empty() {
        return Err(ApiError::bad_request("new_password is required"));
    }

    let password_hash = hash(&state, req.new_password).await?;
    if !state.store.set_password_hash(&user_id, &password_hash).await? {
        return Err(user_not_found());
    }
    tracing::info!("Admin {} reset the password of {}", admin.user_id, user_id);
    Ok(Json(SuccessResponse::ok()))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    admin.ensure_admin()?;
    if user_id == admin.user_id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }
    let target = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or_else(user_not_found)?;
    if target.is_admin && state.store.count_other_admins(&user_id).await? < 1 {
        return Err(ApiError::bad_request("Cannot delete the last admin user"));
    }

    let sessions = state.store.list_sessions(&user_id).await?;
    if !state.store.delete_user(&user_id).await? {
        return Err(user_not_found());
    }
    for session in sessions {
        state.sessions.remove(&session.session_id).await;
    }
    tracing::info!("Admin {} deleted user {}", admin.user_id, user_id);
    Ok(Json(SuccessResponse::ok()))
}

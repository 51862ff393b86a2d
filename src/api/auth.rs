//! Login, token validation and the auth middleware.
//!
//! - Clients submit `{user_id, password}` to `/api/auth/login`
//! - The server returns an HS256 JWT carrying the user id and admin flag
//! - Every other `/api` route except health requires `Authorization: Bearer <jwt>`
//!
//! Tokens are stateless: logout is acknowledged but nothing is revoked, and a
//! disabled account keeps access until its token expires.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::error::ApiError;
use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse, LoginUser, SuccessResponse, ValidateResponse};
use crate::auth::{issue_token, verify_password, verify_token};
use crate::util::now_string;

/// Authenticated caller, inserted by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn ensure_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin access required".to_string()))
        }
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("Invalid email or password")
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user_id = req.user_id.trim().to_string();
    let user = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !user.is_active {
        return Err(ApiError::unauthorized("Account is disabled"));
    }

    // Hash checks are slow; keep them off the async workers.
    let stored = user.password_hash.clone();
    let password = req.password;
    let checked = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check failed: {}", e)))?;
    match checked {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!("Failed login for {}", user_id);
            return Err(invalid_credentials());
        }
        Err(e) => {
            tracing::warn!("Unusable password hash for {}: {}", user_id, e);
            return Err(invalid_credentials());
        }
    }

    let last_login = now_string();
    state.store.touch_last_login(&user.user_id, &last_login).await?;

    let (token, _exp) = issue_token(
        &state.config.auth.jwt_secret,
        &user.user_id,
        user.is_admin,
        state.config.auth.token_ttl_hours,
    )?;
    tracing::info!("User {} logged in", user.user_id);

    Ok(Json(LoginResponse {
        token,
        user: LoginUser {
            user_id: user.user_id,
            is_admin: user.is_admin,
            last_login: Some(last_login),
        },
    }))
}

pub async fn validate(Extension(user): Extension<AuthUser>) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        valid: true,
        user_id: user.user_id,
        is_admin: user.is_admin,
    })
}

pub async fn logout(Extension(user): Extension<AuthUser>) -> Json<SuccessResponse> {
    tracing::debug!("User {} logged out", user.user_id);
    Json(SuccessResponse::ok())
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => token.trim(),
        _ => return ApiError::unauthorized("Not authenticated").into_response(),
    };

    match verify_token(token, &state.config.auth.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthUser {
                user_id: claims.sub,
                is_admin: claims.is_admin,
            });
            next.run(req).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

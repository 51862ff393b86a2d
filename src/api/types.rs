//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::store::{SessionRecord, UserRecord};
use crate::thoughts::SessionState;

/// Login request.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

/// Public part of a user returned at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUser {
    pub user_id: String,
    pub is_admin: bool,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub user_id: String,
    pub is_admin: bool,
}

/// `{"success": true}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether a model is configured for `/run`
    pub agents_enabled: bool,
    pub model: String,
    pub persistent_store: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub session_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSessionRequest {
    pub session_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session: SessionRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    pub answer: String,
    pub state: SessionState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub user_id: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user: UserRecord,
}

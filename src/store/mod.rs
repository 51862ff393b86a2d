//! Application storage with pluggable backends.
//!
//! Supports:
//! - `sqlite`: SQLite database (production)
//! - `memory`: In-memory storage (non-persistent, for testing)

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::auth::hash_password;
use crate::config::AdminSeed;
use crate::thoughts::SessionState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("Failed to (de)serialize session state: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage task failed: {0}")]
    Task(String),

    #[error("Failed to open store: {0}")]
    Open(String),
}

/// A user account.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_active: bool,
}

/// Optional flag changes for an account.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserUpdate {
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.is_admin.is_none() && self.is_active.is_none()
    }
}

/// A chat session owned by one user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub session_name: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
    pub last_message_preview: Option<String>,
    pub agent_count: i64,
}

/// Store trait, implemented by all storage backends.
///
/// Session lookups take the owner id; a session owned by someone else is
/// indistinguishable from a missing one.
#[async_trait]
pub trait AppStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    async fn count_users(&self) -> Result<usize, StoreError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// All users, oldest first.
    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Create an account. `StoreError::Conflict` if the id is taken.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Apply flag changes. `None` if the user does not exist.
    async fn update_user(
        &self,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// Replace the password hash. `false` if the user does not exist.
    async fn set_password_hash(&self, user_id: &str, password_hash: &str)
        -> Result<bool, StoreError>;

    async fn touch_last_login(&self, user_id: &str, at: &str) -> Result<(), StoreError>;

    /// Delete an account and its sessions. `false` if the user does not exist.
    async fn delete_user(&self, user_id: &str) -> Result<bool, StoreError>;

    /// Number of admins other than `user_id`.
    async fn count_other_admins(&self, user_id: &str) -> Result<usize, StoreError>;

    /// Sessions of `user_id`, most recently updated first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, StoreError>;

    async fn create_session(&self, user_id: &str, name: &str)
        -> Result<SessionRecord, StoreError>;

    async fn get_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Bump `updated_at` and optionally rename.
    async fn update_session(
        &self,
        session_id: &str,
        user_id: &str,
        name: Option<&str>,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Delete a session and its saved state. `false` if not found for this owner.
    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// Record a finished turn: two more messages, a new preview, the agent count.
    async fn record_turn(
        &self,
        session_id: &str,
        preview: &str,
        agent_count: i64,
    ) -> Result<(), StoreError>;

    async fn load_session_state(&self, session_id: &str)
        -> Result<Option<SessionState>, StoreError>;

    async fn save_session_state(
        &self,
        session_id: &str,
        state: &SessionState,
    ) -> Result<(), StoreError>;
}

/// Create the admin account when there are no users yet.
///
/// Returns `true` if an account was created.
pub async fn seed_admin(
    store: &dyn AppStore,
    seed: &AdminSeed,
    hash_rounds: u32,
) -> Result<bool, StoreError> {
    let count = store.count_users().await?;
    if count > 0 {
        tracing::info!("Users table already has {} user(s), skipping seed", count);
        return Ok(false);
    }

    store
        .create_user(NewUser {
            user_id: seed.user_id.clone(),
            password_hash: hash_password(&seed.password, hash_rounds),
            is_admin: true,
            is_active: true,
        })
        .await?;
    tracing::info!("Seeded admin user: {}", seed.user_id);
    Ok(true)
}

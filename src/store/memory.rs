//! In-memory application store (non-persistent).

use super::{AppStore, NewUser, SessionRecord, StoreError, UserRecord, UserUpdate};
use crate::thoughts::SessionState;
use crate::util::now_string;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    sessions: HashMap<String, SessionRecord>,
    states: HashMap<String, String>,
}

/// All tables sit behind one lock so cascading deletes are atomic.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppStore for InMemoryStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn count_users(&self) -> Result<usize, StoreError> {
        Ok(self.tables.read().await.users.len())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let mut users: Vec<UserRecord> = self.tables.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.user_id) {
            return Err(StoreError::Conflict(format!("User {}", user.user_id)));
        }
        let record = UserRecord {
            user_id: user.user_id,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
            is_active: user.is_active,
            created_at: now_string(),
            last_login: None,
        };
        tables.users.insert(record.user_id.clone(), record.clone());
        Ok(record)
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(user_id).map(|user| {
            if let Some(is_admin) = update.is_admin {
                user.is_admin = is_admin;
            }
            if let Some(is_active) = update.is_active {
                user.is_active = is_active;
            }
            user.clone()
        }))
    }

    async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_last_login(&self, user_id: &str, at: &str) -> Result<(), StoreError> {
        if let Some(user) = self.tables.write().await.users.get_mut(user_id) {
            user.last_login = Some(at.to_string());
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(user_id).is_none() {
            return Ok(false);
        }
        let owned: Vec<String> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.session_id.clone())
            .collect();
        for session_id in owned {
            tables.sessions.remove(&session_id);
            tables.states.remove(&session_id);
        }
        Ok(true)
    }

    async fn count_other_admins(&self, user_id: &str) -> Result<usize, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .filter(|u| u.is_admin && u.user_id != user_id)
            .count())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, StoreError> {
        let mut sessions: Vec<SessionRecord> = self
            .tables
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn create_session(&self, user_id: &str, name: &str) -> Result<SessionRecord, StoreError> {
        let now = now_string();
        let record = SessionRecord {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            session_name: name.to_string(),
            created_at: now.clone(),
            updated_at: now,
            message_count: 0,
            last_message_preview: None,
            agent_count: 0,
        };
        self.tables
            .write()
            .await
            .sessions
            .insert(record.session_id.clone(), record.clone());
        Ok(record)
    }

    async fn get_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .get(session_id)
            .filter(|s| s.user_id == user_id)
            .cloned())
    }

    async fn update_session(
        &self,
        session_id: &str,
        user_id: &str,
        name: Option<&str>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .sessions
            .get_mut(session_id)
            .filter(|s| s.user_id == user_id)
            .map(|session| {
                session.updated_at = now_string();
                if let Some(name) = name {
                    session.session_name = name.to_string();
                }
                session.clone()
            }))
    }

    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .sessions
            .get(session_id)
            .is_some_and(|s| s.user_id == user_id);
        if owned {
            tables.sessions.remove(session_id);
            tables.states.remove(session_id);
        }
        Ok(owned)
    }

    async fn record_turn(
        &self,
        session_id: &str,
        preview: &str,
        agent_count: i64,
    ) -> Result<(), StoreError> {
        if let Some(session) = self.tables.write().await.sessions.get_mut(session_id) {
            session.message_count += 2;
            session.last_message_preview = Some(preview.to_string());
            session.agent_count = agent_count;
            session.updated_at = now_string();
        }
        Ok(())
    }

    async fn load_session_state(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionState>, StoreError> {
        let tables = self.tables.read().await;
        tables
            .states
            .get(session_id)
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .transpose()
    }

    async fn save_session_state(
        &self,
        session_id: &str,
        state: &SessionState,
    ) -> Result<(), StoreError> {
        // Same wire format as the SQLite backend.
        let json = serde_json::to_string(state)?;
        self.tables
            .write()
            .await
            .states
            .insert(session_id.to_string(), json);
        Ok(())
    }
}

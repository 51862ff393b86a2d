//! SQLite-based application store.

use super::{AppStore, NewUser, SessionRecord, StoreError, UserRecord, UserUpdate};
use crate::thoughts::SessionState;
use crate::util::now_string;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY NOT NULL,
    password_hash TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_login TEXT
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    session_name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    message_count INTEGER NOT NULL DEFAULT 0,
    last_message_preview TEXT,
    agent_count INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (user_id) REFERENCES users(user_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_updated ON sessions(user_id, updated_at DESC);

CREATE TABLE IF NOT EXISTS session_state (
    session_id TEXT PRIMARY KEY NOT NULL,
    state_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES sessions(session_id) ON DELETE CASCADE
);
"#;

const USER_COLUMNS: &str = "user_id, password_hash, is_admin, is_active, created_at, last_login";

const SESSION_COLUMNS: &str = "session_id, user_id, session_name, created_at, updated_at,
     message_count, last_message_preview, agent_count";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn open(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Open(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Self::run_migrations(&conn)?;
            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// CREATE TABLE IF NOT EXISTS doesn't add columns to existing tables,
    /// so columns added after the first release are patched in here.
    fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
        for (table, column, ddl) in [
            (
                "users",
                "last_login",
                "ALTER TABLE users ADD COLUMN last_login TEXT",
            ),
            (
                "sessions",
                "agent_count",
                "ALTER TABLE sessions ADD COLUMN agent_count INTEGER NOT NULL DEFAULT 0",
            ),
            (
                "sessions",
                "last_message_preview",
                "ALTER TABLE sessions ADD COLUMN last_message_preview TEXT",
            ),
        ] {
            let exists = conn
                .prepare(&format!(
                    "SELECT 1 FROM pragma_table_info('{}') WHERE name = ?1",
                    table
                ))?
                .exists(params![column])?;
            if !exists {
                tracing::info!("Running migration: adding '{}' column to {}", column, table);
                conn.execute(ddl, [])?;
            }
        }
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        user_id: row.get(0)?,
        password_hash: row.get(1)?,
        is_admin: row.get::<_, i64>(2)? != 0,
        is_active: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
        last_login: row.get(5)?,
    })
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        session_name: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        message_count: row.get(5)?,
        last_message_preview: row.get(6)?,
        agent_count: row.get(7)?,
    })
}

fn select_user(conn: &Connection, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
            params![user_id],
            user_from_row,
        )
        .optional()?)
}

fn select_session(
    conn: &Connection,
    session_id: &str,
    user_id: &str,
) -> Result<Option<SessionRecord>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM sessions WHERE session_id = ?1 AND user_id = ?2",
                SESSION_COLUMNS
            ),
            params![session_id, user_id],
            session_from_row,
        )
        .optional()?)
}

#[async_trait]
impl AppStore for SqliteStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn count_users(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| select_user(conn, &user_id)).await
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at, rowid",
                USER_COLUMNS
            ))?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
        .await
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        self.with_conn(move |conn| {
            let now = now_string();
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (user_id, password_hash, is_admin, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.user_id,
                    user.password_hash,
                    user.is_admin,
                    user.is_active,
                    now
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::Conflict(format!("User {}", user.user_id)));
            }
            select_user(conn, &user.user_id)?.ok_or_else(|| {
                StoreError::Task(format!("User {} vanished after insert", user.user_id))
            })
        })
        .await
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<Option<UserRecord>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET is_admin = COALESCE(?2, is_admin), is_active = COALESCE(?3, is_active)
                 WHERE user_id = ?1",
                params![user_id, update.is_admin, update.is_active],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_user(conn, &user_id)
        })
        .await
    }

    async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let user_id = user_id.to_string();
        let password_hash = password_hash.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET password_hash = ?2 WHERE user_id = ?1",
                params![user_id, password_hash],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn touch_last_login(&self, user_id: &str, at: &str) -> Result<(), StoreError> {
        let user_id = user_id.to_string();
        let at = at.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE users SET last_login = ?2 WHERE user_id = ?1",
                params![user_id, at],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn count_other_admins(&self, user_id: &str) -> Result<usize, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE is_admin = 1 AND user_id != ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM sessions WHERE user_id = ?1 ORDER BY updated_at DESC",
                SESSION_COLUMNS
            ))?;
            let sessions = stmt
                .query_map(params![user_id], session_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
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
        let row = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (session_id, user_id, session_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.session_id,
                    row.user_id,
                    row.session_name,
                    row.created_at,
                    row.updated_at
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(record)
    }

    async fn get_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();
        self.with_conn(move |conn| select_session(conn, &session_id, &user_id))
            .await
    }

    async fn update_session(
        &self,
        session_id: &str,
        user_id: &str,
        name: Option<&str>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();
        let name = name.map(|n| n.to_string());
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions
                 SET updated_at = ?3, session_name = COALESCE(?4, session_name)
                 WHERE session_id = ?1 AND user_id = ?2",
                params![session_id, user_id, now_string(), name],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_session(conn, &session_id, &user_id)
        })
        .await
    }

    async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM sessions WHERE session_id = ?1 AND user_id = ?2",
                params![session_id, user_id],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn record_turn(
        &self,
        session_id: &str,
        preview: &str,
        agent_count: i64,
    ) -> Result<(), StoreError> {
        let session_id = session_id.to_string();
        let preview = preview.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET message_count = message_count + 2, last_message_preview = ?2,
                     agent_count = ?3, updated_at = ?4
                 WHERE session_id = ?1",
                params![session_id, preview, agent_count, now_string()],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_session_state(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionState>, StoreError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT state_json FROM session_state WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?;
            json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
                .transpose()
        })
        .await
    }

    async fn save_session_state(
        &self,
        session_id: &str,
        state: &SessionState,
    ) -> Result<(), StoreError> {
        let session_id = session_id.to_string();
        let json = serde_json::to_string(state)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO session_state (session_id, state_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET
                    state_json = excluded.state_json,
                    updated_at = excluded.updated_at",
                params![session_id, json, now_string()],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reopening_keeps_data_and_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.db");
        {
            let store = SqliteStore::open(path.clone()).await.unwrap();
            store
                .create_user(NewUser {
                    user_id: "a@example.com".to_string(),
                    password_hash: "h".to_string(),
                    is_admin: true,
                    is_active: true,
                })
                .await
                .unwrap();
        }
        let store = SqliteStore::open(path).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn migration_adds_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE users (
                    user_id TEXT PRIMARY KEY NOT NULL,
                    password_hash TEXT NOT NULL,
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL
                 );
                 CREATE TABLE sessions (
                    session_id TEXT PRIMARY KEY NOT NULL,
                    user_id TEXT NOT NULL,
                    session_name TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    message_count INTEGER NOT NULL DEFAULT 0
                 );",
            )
            .unwrap();
        }

        let store = SqliteStore::open(path).await.unwrap();
        store
            .create_user(NewUser {
                user_id: "a@example.com".to_string(),
                password_hash: "h".to_string(),
                is_admin: false,
                is_active: true,
            })
            .await
            .unwrap();
        let session = store.create_session("a@example.com", "Chat").await.unwrap();
        store.record_turn(&session.session_id, "hi", 2).await.unwrap();
        let session = store
            .get_session(&session.session_id, "a@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.agent_count, 2);
        assert_eq!(session.last_message_preview.as_deref(), Some("hi"));
    }
}

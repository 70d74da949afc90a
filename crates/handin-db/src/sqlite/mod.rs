pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use handin_core::api_key::ApiKey;
use handin_core::caller::Role;
use handin_core::completed_task::{CompletedTask, CompletedTaskFilter, CreateCompletedTask};

use crate::{Database, DbConfig, DbError};

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("handin.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        tracing::debug!("opened sqlite database at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(|conn| migrations::run(conn))
    }
}

/// Map a `rusqlite::Error` into a `DbError::Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}


#[async_trait]
impl Database for SqliteDatabase {
    // -- Completed tasks --
    async fn create_completed_task(
        &self,
        input: &CreateCompletedTask,
    ) -> Result<CompletedTask, DbError> {
        let db = self.clone();
        let input = input.clone();
        tokio::task::spawn_blocking(move || db.create_completed_task_sync(&input))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
    async fn get_completed_task(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> Result<CompletedTask, DbError> {
        let db = self.clone();
        let id = id.to_string();
        let owner = owner.map(|s| s.to_string());
        tokio::task::spawn_blocking(move || db.get_completed_task_sync(&id, owner.as_deref()))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
    async fn list_completed_tasks(
        &self,
        filter: &CompletedTaskFilter,
    ) -> Result<Vec<CompletedTask>, DbError> {
        let db = self.clone();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || db.list_completed_tasks_sync(&filter))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
    async fn count_completed_tasks(&self, user_id: Option<&str>) -> Result<i64, DbError> {
        let db = self.clone();
        let user_id = user_id.map(|s| s.to_string());
        tokio::task::spawn_blocking(move || db.count_completed_tasks_sync(user_id.as_deref()))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }

    // -- API keys --
    async fn insert_api_key(
        &self,
        name: &str,
        key_hash: &str,
        user_id: &str,
        role: Role,
    ) -> Result<ApiKey, DbError> {
        let db = self.clone();
        let name = name.to_string();
        let key_hash = key_hash.to_string();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            db.insert_api_key_sync(&name, &key_hash, &user_id, role)
        })
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?
    }
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError> {
        let db = self.clone();
        let key_hash = key_hash.to_string();
        tokio::task::spawn_blocking(move || db.find_api_key_by_hash_sync(&key_hash))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.touch_api_key_sync(&id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
    async fn has_api_keys(&self) -> Result<bool, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.has_api_keys_sync())
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.list_api_keys_sync())
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError> {
        let db = self.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || db.delete_api_key_sync(&id))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

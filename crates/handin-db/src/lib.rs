#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use handin_core::api_key::ApiKey;
use handin_core::caller::Role;
use handin_core::completed_task::{CompletedTask, CompletedTaskFilter, CreateCompletedTask};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend for completed tasks and the API keys that gate them.
///
/// Completed tasks are written by the submission subsystem; the HTTP layer
/// only reads them.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Completed tasks --
    async fn create_completed_task(
        &self,
        input: &CreateCompletedTask,
    ) -> Result<CompletedTask, DbError>;
    /// Look up one record. With `owner` set, records belonging to anyone else
    /// are reported as not found.
    async fn get_completed_task(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> Result<CompletedTask, DbError>;
    /// Newest first by `submitted_at`.
    async fn list_completed_tasks(
        &self,
        filter: &CompletedTaskFilter,
    ) -> Result<Vec<CompletedTask>, DbError>;
    async fn count_completed_tasks(&self, user_id: Option<&str>) -> Result<i64, DbError>;

    // -- API keys --
    async fn insert_api_key(
        &self,
        name: &str,
        key_hash: &str,
        user_id: &str,
        role: Role,
    ) -> Result<ApiKey, DbError>;
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError>;
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError>;
    async fn has_api_keys(&self) -> Result<bool, DbError>;
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError>;
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError>;
}

/// Backend selection.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Postgres connection URL. When `None`, use SQLite.
    pub database_url: Option<String>,
    /// SQLite file path. Defaults to `<data_dir>/handin.db`.
    pub sqlite_path: Option<String>,
}

impl DbConfig {
    /// `HANDIN_DATABASE_URL` (or `DATABASE_URL`) selects Postgres;
    /// `HANDIN_SQLITE_PATH` overrides the SQLite file location.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("HANDIN_DATABASE_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .ok()
                .filter(|u| !u.is_empty()),
            sqlite_path: std::env::var("HANDIN_SQLITE_PATH")
                .ok()
                .filter(|p| !p.is_empty()),
        }
    }
}

/// Open the configured backend, running migrations.
pub async fn open_database(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    if let Some(url) = config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        {
            tracing::info!("using postgres backend");
            Ok(Arc::new(PostgresDatabase::connect(url).await?))
        }
        #[cfg(not(feature = "postgres"))]
        {
            let _ = url;
            Err(DbError::Internal(
                "database URL configured but the 'postgres' feature is not enabled".into(),
            ))
        }
    } else {
        #[cfg(feature = "sqlite")]
        {
            let db = SqliteDatabase::open(config)?;
            Ok(Arc::new(db))
        }
        #[cfg(not(feature = "sqlite"))]
        {
            Err(DbError::Internal(
                "no database URL configured and the 'sqlite' feature is not enabled".into(),
            ))
        }
    }
}

/// `$XDG_DATA_HOME/handin`, falling back to `~/.local/share/handin`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("handin")
}

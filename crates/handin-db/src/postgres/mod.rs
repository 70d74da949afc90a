pub(crate) mod migrations;
pub mod queries;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use handin_core::api_key::ApiKey;
use handin_core::caller::Role;
use handin_core::completed_task::{CompletedTask, CompletedTaskFilter, CreateCompletedTask};

use crate::{Database, DbError};

/// Map a sqlx::Error into a DbError::Internal.
pub(crate) fn pg_err(e: sqlx::Error) -> DbError {
    DbError::Internal(e.to_string())
}

/// Create a DbError::NotFound with the given entity description.
pub(crate) fn pg_not_found(entity: &str) -> DbError {
    DbError::NotFound(entity.to_string())
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pub(crate) pool: PgPool,
}

impl PostgresDatabase {
    /// Connect to a Postgres database and run migrations.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(pg_err)?;

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        Ok(db)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    // -- Completed tasks --
    async fn create_completed_task(
        &self,
        input: &CreateCompletedTask,
    ) -> Result<CompletedTask, DbError> {
        self.pg_create_completed_task(input).await
    }
    async fn get_completed_task(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> Result<CompletedTask, DbError> {
        self.pg_get_completed_task(id, owner).await
    }
    async fn list_completed_tasks(
        &self,
        filter: &CompletedTaskFilter,
    ) -> Result<Vec<CompletedTask>, DbError> {
        self.pg_list_completed_tasks(filter).await
    }
    async fn count_completed_tasks(&self, user_id: Option<&str>) -> Result<i64, DbError> {
        self.pg_count_completed_tasks(user_id).await
    }

    // -- API keys --
    async fn insert_api_key(
        &self,
        name: &str,
        key_hash: &str,
        user_id: &str,
        role: Role,
    ) -> Result<ApiKey, DbError> {
        self.pg_insert_api_key(name, key_hash, user_id, role).await
    }
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError> {
        self.pg_find_api_key_by_hash(key_hash).await
    }
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError> {
        self.pg_touch_api_key(id).await
    }
    async fn has_api_keys(&self) -> Result<bool, DbError> {
        self.pg_has_api_keys().await
    }
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        self.pg_list_api_keys().await
    }
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError> {
        self.pg_delete_api_key(id).await
    }
}

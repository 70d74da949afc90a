use chrono::{DateTime, Utc};

use handin_core::completed_task::{
    CompletedTask, CompletedTaskFilter, CreateCompletedTask, TaskFile,
};

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::DbError;

#[derive(sqlx::FromRow)]
struct CompletedTaskRow {
    id: String,
    user_id: String,
    submitted_at: DateTime<Utc>,
    file_path: Option<String>,
    file_filename: Option<String>,
    file_original_name: Option<String>,
    details: String,
}

impl TryFrom<CompletedTaskRow> for CompletedTask {
    type Error = DbError;

    fn try_from(r: CompletedTaskRow) -> Result<Self, DbError> {
        let details = serde_json::from_str(&r.details)
            .map_err(|e| DbError::Internal(format!("completed task {} details: {e}", r.id)))?;
        let file = TaskFile {
            path: r.file_path,
            filename: r.file_filename,
            original_name: r.file_original_name,
        };
        Ok(CompletedTask {
            id: r.id,
            user_id: r.user_id,
            submitted_at: r.submitted_at,
            file: (!file.is_empty()).then_some(file),
            details,
        })
    }
}

impl PostgresDatabase {
    pub(crate) async fn pg_create_completed_task(
        &self,
        input: &CreateCompletedTask,
    ) -> Result<CompletedTask, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let submitted_at = input.submitted_at.unwrap_or_else(Utc::now);
        let file = input.file.clone().unwrap_or_default();
        let details = serde_json::to_string(&input.opaque_details())
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO completed_tasks (
                id, user_id, submitted_at, file_path, file_filename, file_original_name, details
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&id)
        .bind(&input.user_id)
        .bind(submitted_at)
        .bind(&file.path)
        .bind(&file.filename)
        .bind(&file.original_name)
        .bind(&details)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;

        self.pg_get_completed_task(&id, None).await
    }

    pub(crate) async fn pg_get_completed_task(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> Result<CompletedTask, DbError> {
        let row = sqlx::query_as::<_, CompletedTaskRow>(
            "SELECT * FROM completed_tasks
             WHERE id = $1 AND ($2::TEXT IS NULL OR user_id = $2)",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?
        .ok_or_else(|| pg_not_found(&format!("completed task {id}")))?;

        row.try_into()
    }

    pub(crate) async fn pg_list_completed_tasks(
        &self,
        filter: &CompletedTaskFilter,
    ) -> Result<Vec<CompletedTask>, DbError> {
        let rows = sqlx::query_as::<_, CompletedTaskRow>(
            "SELECT * FROM completed_tasks
             WHERE ($1::TEXT IS NULL OR user_id = $1)
             ORDER BY submitted_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(filter.user_id.as_deref())
        .bind(filter.limit.max(0))
        .bind(filter.offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        rows.into_iter().map(CompletedTask::try_from).collect()
    }

    pub(crate) async fn pg_count_completed_tasks(
        &self,
        user_id: Option<&str>,
    ) -> Result<i64, DbError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM completed_tasks WHERE ($1::TEXT IS NULL OR user_id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)
    }
}

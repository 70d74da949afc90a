use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Row};

use handin_core::completed_task::{
    CompletedTask, CompletedTaskFilter, CreateCompletedTask, TaskFile,
};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_completed_task(row: &Row) -> rusqlite::Result<CompletedTask> {
    let details: String = row.get("details")?;
    let details = serde_json::from_str(&details)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let file = TaskFile {
        path: row.get("file_path")?,
        filename: row.get("file_filename")?,
        original_name: row.get("file_original_name")?,
    };
    Ok(CompletedTask {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        submitted_at: row.get("submitted_at")?,
        file: (!file.is_empty()).then_some(file),
        details,
    })
}

impl SqliteDatabase {
    pub fn create_completed_task_sync(
        &self,
        input: &CreateCompletedTask,
    ) -> Result<CompletedTask, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let submitted_at = input.submitted_at.unwrap_or_else(Utc::now);
            let file = input.file.clone().unwrap_or_default();
            let details = serde_json::to_string(&input.opaque_details())
                .map_err(|e| DbError::Internal(e.to_string()))?;
            conn.execute(
                "INSERT INTO completed_tasks (
                    id, user_id, submitted_at, file_path, file_filename, file_original_name, details
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    input.user_id,
                    submitted_at,
                    file.path,
                    file.filename,
                    file.original_name,
                    details,
                ],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM completed_tasks WHERE id = ?1",
                params![id],
                row_to_completed_task,
            )
            .to_db()
        })
    }

    pub fn get_completed_task_sync(
        &self,
        id: &str,
        owner: Option<&str>,
    ) -> Result<CompletedTask, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM completed_tasks
                 WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)",
                params![id, owner],
                row_to_completed_task,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    DbError::NotFound(format!("completed task {id}"))
                }
                other => DbError::Internal(other.to_string()),
            })
        })
    }

    pub fn list_completed_tasks_sync(
        &self,
        filter: &CompletedTaskFilter,
    ) -> Result<Vec<CompletedTask>, DbError> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM completed_tasks WHERE 1=1");
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(ref user_id) = filter.user_id {
                param_values.push(Box::new(user_id.clone()));
                sql.push_str(&format!(" AND user_id = ?{}", param_values.len()));
            }

            sql.push_str(" ORDER BY submitted_at DESC, id DESC");

            param_values.push(Box::new(filter.limit.max(0)));
            sql.push_str(&format!(" LIMIT ?{}", param_values.len()));
            param_values.push(Box::new(filter.offset.max(0)));
            sql.push_str(&format!(" OFFSET ?{}", param_values.len()));

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn.prepare(&sql).to_db()?;
            let tasks = stmt
                .query_map(params_ref.as_slice(), row_to_completed_task)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(tasks)
        })
    }

    pub fn count_completed_tasks_sync(&self, user_id: Option<&str>) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM completed_tasks WHERE ?1 IS NULL OR user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .to_db()
        })
    }
}

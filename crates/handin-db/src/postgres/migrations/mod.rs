use sqlx::{PgConnection, PgPool};

use super::pg_err;
use crate::DbError;

/// Fixed key for the advisory lock that serialises migration runs.
const MIGRATION_LOCK_KEY: i64 = 0x68616E64_696E0001; // "handin" + 1

/// Apply pending migrations. The advisory lock is session-scoped, so the
/// lock, the migrations and the unlock all run on one pooled connection.
pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    let mut conn = pool.acquire().await.map_err(pg_err)?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await
        .map_err(pg_err)?;

    let result = apply_pending(&mut *conn).await;

    let released: Result<bool, _> = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await;
    match released {
        Ok(true) => {}
        Ok(false) => tracing::warn!("migration advisory lock was not held at unlock"),
        Err(e) => {
            // Drop the connection rather than return it to the pool still
            // holding the lock.
            tracing::warn!("failed to release migration lock: {e}");
            drop(conn.detach());
        }
    }

    result
}

async fn apply_pending(conn: &mut PgConnection) -> Result<(), DbError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(&mut *conn)
    .await
    .map_err(pg_err)?;

    let current: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(&mut *conn)
        .await
        .map_err(pg_err)?;

    if current < 1 {
        sqlx::raw_sql(include_str!("sql/V1__initial.sql"))
            .execute(&mut *conn)
            .await
            .map_err(pg_err)?;
        tracing::info!("applied postgres migration V1");
    }

    Ok(())
}

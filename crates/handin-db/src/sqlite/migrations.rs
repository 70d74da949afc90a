use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS completed_tasks (
                 id                 TEXT PRIMARY KEY,
                 user_id            TEXT NOT NULL,
                 submitted_at       TEXT NOT NULL,
                 file_path          TEXT,
                 file_filename      TEXT,
                 file_original_name TEXT,
                 details            TEXT NOT NULL DEFAULT '{}'
             );
             CREATE INDEX IF NOT EXISTS idx_completed_tasks_user
                 ON completed_tasks(user_id, submitted_at DESC);
             CREATE INDEX IF NOT EXISTS idx_completed_tasks_submitted
                 ON completed_tasks(submitted_at DESC);

             CREATE TABLE IF NOT EXISTS api_keys (
                 id           TEXT PRIMARY KEY,
                 name         TEXT NOT NULL DEFAULT '',
                 key_hash     TEXT NOT NULL UNIQUE,
                 user_id      TEXT NOT NULL,
                 role         TEXT NOT NULL DEFAULT 'user'
                                  CHECK(role IN ('user', 'admin')),
                 created_at   TEXT NOT NULL,
                 last_used_at TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_api_keys_hash ON api_keys(key_hash);",
        )
        .to_db()?;

        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'))",
            [],
        )
        .to_db()?;
    }

    Ok(())
}

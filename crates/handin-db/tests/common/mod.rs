// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so that the same logic
// can be exercised against both the SQLite and Postgres backends.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use handin_core::caller::Role;
use handin_core::completed_task::{CompletedTaskFilter, CreateCompletedTask, TaskFile};
use handin_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn make_task(user_id: &str, minutes: i64) -> CreateCompletedTask {
    CreateCompletedTask {
        user_id: user_id.to_string(),
        submitted_at: Some(base_time() + Duration::minutes(minutes)),
        file: None,
        details: serde_json::Map::new(),
    }
}

fn page(user_id: Option<&str>, offset: i64, limit: i64) -> CompletedTaskFilter {
    CompletedTaskFilter {
        user_id: user_id.map(str::to_string),
        offset,
        limit,
    }
}

// ---------------------------------------------------------------------------
// Completed task tests
// ---------------------------------------------------------------------------

/// Create a fully populated record and read it back, scoped and unscoped.
pub async fn test_completed_task_round_trip(db: &dyn Database) {
    let mut input = make_task("u1", 0);
    input.file = Some(TaskFile {
        path: Some("/var/lib/handin/uploads/abc".into()),
        filename: Some("abc.zip".into()),
        original_name: Some("project.zip".into()),
    });
    input.details.insert("assignmentId".into(), json!("a-7"));
    input.details.insert("grade".into(), json!({ "points": 18, "of": 20 }));

    let created = db.create_completed_task(&input).await.unwrap();
    assert_eq!(created.user_id, "u1");
    assert_eq!(created.submitted_at, base_time());
    assert_eq!(created.details["grade"]["points"], 18);

    let any = db.get_completed_task(&created.id, None).await.unwrap();
    assert_eq!(any, created);

    let own = db.get_completed_task(&created.id, Some("u1")).await.unwrap();
    assert_eq!(own.id, created.id);

    let file = own.file.unwrap();
    assert_eq!(file.download_name().as_deref(), Some("project.zip"));
}

/// A user-scoped lookup for someone else's record behaves like a missing id.
pub async fn test_owner_scoped_lookup(db: &dyn Database) {
    let created = db.create_completed_task(&make_task("u1", 0)).await.unwrap();

    let err = db
        .get_completed_task(&created.id, Some("u2"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));

    let err = db.get_completed_task("no-such-id", None).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

/// 25 records for one user: the second page of 20 holds the oldest 5.
pub async fn test_paging_and_counts(db: &dyn Database) {
    for m in 0..25 {
        db.create_completed_task(&make_task("u1", m)).await.unwrap();
    }
    for m in 0..3 {
        db.create_completed_task(&make_task("u2", 100 + m)).await.unwrap();
    }

    let first = db.list_completed_tasks(&page(Some("u1"), 0, 20)).await.unwrap();
    assert_eq!(first.len(), 20);
    assert_eq!(first[0].submitted_at, base_time() + Duration::minutes(24));

    let second = db.list_completed_tasks(&page(Some("u1"), 20, 20)).await.unwrap();
    assert_eq!(second.len(), 5);
    assert_eq!(second[4].submitted_at, base_time());
    assert!(second.iter().all(|t| t.user_id == "u1"));

    let beyond = db.list_completed_tasks(&page(Some("u1"), 40, 20)).await.unwrap();
    assert!(beyond.is_empty());

    assert_eq!(db.count_completed_tasks(Some("u1")).await.unwrap(), 25);
    assert_eq!(db.count_completed_tasks(Some("u2")).await.unwrap(), 3);
    assert_eq!(db.count_completed_tasks(None).await.unwrap(), 28);

    let all = db.list_completed_tasks(&page(None, 0, 5)).await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all[..3].iter().all(|t| t.user_id == "u2"));
}

/// Listing order is stable across repeated calls, even with equal timestamps.
pub async fn test_listing_is_deterministic(db: &dyn Database) {
    for _ in 0..6 {
        db.create_completed_task(&make_task("u1", 0)).await.unwrap();
    }
    let a = db.list_completed_tasks(&page(Some("u1"), 0, 4)).await.unwrap();
    let b = db.list_completed_tasks(&page(Some("u1"), 0, 4)).await.unwrap();
    assert_eq!(a, b);

    let rest = db.list_completed_tasks(&page(Some("u1"), 4, 4)).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert!(rest.iter().all(|r| a.iter().all(|x| x.id != r.id)));
}

// ---------------------------------------------------------------------------
// API key tests
// ---------------------------------------------------------------------------

pub async fn test_api_key_lifecycle(db: &dyn Database) {
    assert!(!db.has_api_keys().await.unwrap());

    let key = db
        .insert_api_key("ops", "hash-abc", "admin-1", Role::Admin)
        .await
        .unwrap();
    assert_eq!(key.role, Role::Admin);
    assert_eq!(key.user_id, "admin-1");
    assert!(db.has_api_keys().await.unwrap());

    let found = db.find_api_key_by_hash("hash-abc").await.unwrap().unwrap();
    assert_eq!(found.id, key.id);
    assert!(db.find_api_key_by_hash("nope").await.unwrap().is_none());

    db.touch_api_key(&key.id).await.unwrap();
    let touched = db.find_api_key_by_hash("hash-abc").await.unwrap().unwrap();
    assert!(touched.last_used_at.is_some());

    assert_eq!(db.list_api_keys().await.unwrap().len(), 1);

    db.delete_api_key(&key.id).await.unwrap();
    assert!(!db.has_api_keys().await.unwrap());
    assert!(matches!(
        db.delete_api_key(&key.id).await,
        Err(DbError::NotFound(_))
    ));
}

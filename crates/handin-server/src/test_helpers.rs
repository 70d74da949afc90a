use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::{response::Response, Router};
use chrono::{Duration, TimeZone, Utc};
use handin_core::caller::Role;
use handin_core::completed_task::{CompletedTask, CreateCompletedTask, TaskFile};
use handin_db::{Database, SqliteDatabase};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::auth::{build_auth_config_with_key, generate_api_key, sha256_hex};
use crate::routes::{build_router, AppState, InnerAppState};

pub const MAX_PAGE_LIMIT: i64 = 50;

/// In-memory SQLite app with a bootstrap admin key and a scratch directory
/// for task files.
pub struct TestApp {
    pub state: AppState,
    pub env_admin_key: String,
    pub files: TempDir,
    seq: AtomicI64,
}

impl TestApp {
    pub async fn new() -> Self {
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let env_admin_key = generate_api_key();
        let auth = build_auth_config_with_key(db.clone(), Some(&env_admin_key), None).await;
        Self {
            state: Arc::new(InnerAppState {
                db,
                auth,
                max_page_limit: MAX_PAGE_LIMIT,
            }),
            env_admin_key,
            files: tempfile::tempdir().unwrap(),
            seq: AtomicI64::new(0),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn db(&self) -> &Arc<dyn Database> {
        &self.state.db
    }

    async fn issue_key(&self, user_id: &str, role: Role) -> String {
        let raw = generate_api_key();
        self.db()
            .insert_api_key(&format!("{user_id}-test"), &sha256_hex(&raw), user_id, role)
            .await
            .unwrap();
        raw
    }

    pub async fn user_key(&self, user_id: &str) -> String {
        self.issue_key(user_id, Role::User).await
    }

    pub async fn admin_key(&self, user_id: &str) -> String {
        self.issue_key(user_id, Role::Admin).await
    }

    /// Insert one record. Each call gets a strictly later `submittedAt`.
    pub async fn seed_task(&self, user_id: &str, file: Option<TaskFile>) -> CompletedTask {
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let details = match json!({ "assignment": "essay", "score": n }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        self.db()
            .create_completed_task(&CreateCompletedTask {
                user_id: user_id.to_string(),
                submitted_at: Some(base + Duration::minutes(n)),
                file,
                details,
            })
            .await
            .unwrap()
    }

    pub async fn seed_tasks(&self, user_id: &str, count: usize) -> Vec<CompletedTask> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.seed_task(user_id, None).await);
        }
        out
    }

    /// Write `contents` under the scratch directory and return its path.
    pub fn write_file(&self, name: &str, contents: &[u8]) -> String {
        let path = self.files.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().to_string()
    }
}

/// `GET uri` through the router with a bearer key.
#[cfg(test)]
pub async fn get(router: &Router, uri: &str, key: &str) -> Response {
    use tower::ServiceExt;

    router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {key}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    pub app: TestApp,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port.
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = TestApp::new().await;
    let router = app.router();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    TestServer {
        base_url: format!("http://{addr}"),
        app,
        _handle: handle,
    }
}

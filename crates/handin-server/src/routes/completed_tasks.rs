use axum::{
    body::Body,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue,
    },
    middleware,
    response::Response,
    routing::get,
    Extension, Json, Router,
};
use handin_core::caller::Caller;
use handin_core::completed_task::{CompletedTaskFilter, TaskFile};
use handin_core::pagination::{PageRequest, Pagination};
use handin_db::DbError;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use super::AppState;
use crate::auth::require_admin;
use crate::error::AppError;

const TASK_NOT_FOUND: &str = "Completed task not found";
const FILE_NOT_FOUND: &str = "File not found for this completed task";
const DOWNLOAD_FAILED: &str = "Error downloading file";

pub fn routes() -> Router<AppState> {
    let own = Router::new()
        .route("/my-completed", get(list_own))
        .route("/my-completed/{id}", get(get_own))
        .route("/my-completed/{id}/download", get(download_own));

    let admin = Router::new()
        .route("/admin/all", get(list_all))
        .route("/admin/{id}", get(get_any))
        .route("/admin/{id}/download", get(download_any))
        .route_layer(middleware::from_fn(require_admin));

    Router::new().nest("/api/completed-tasks", own.merge(admin))
}

/// Raw pagination parameters. Kept as strings so malformed values fall back
/// to defaults instead of rejecting the request.
#[derive(Debug, Default)]
struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

impl PageQuery {
    /// A repeated key keeps its first value.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut q = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "page" => &mut q.page,
                "limit" => &mut q.limit,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        q
    }
}

type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;
type IdParam = Result<Path<String>, PathRejection>;

async fn list_own(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: QueryPairs,
) -> Result<Json<Value>, AppError> {
    let Query(pairs) = query?;
    list_page(&state, Some(caller.id), &PageQuery::from_pairs(pairs)).await
}

async fn list_all(
    State(state): State<AppState>,
    query: QueryPairs,
) -> Result<Json<Value>, AppError> {
    let Query(pairs) = query?;
    list_page(&state, None, &PageQuery::from_pairs(pairs)).await
}

async fn list_page(
    state: &AppState,
    user_id: Option<String>,
    q: &PageQuery,
) -> Result<Json<Value>, AppError> {
    let request = PageRequest::from_params(
        q.page.as_deref(),
        q.limit.as_deref(),
        state.max_page_limit,
    );
    let filter = CompletedTaskFilter {
        user_id,
        offset: request.offset(),
        limit: request.limit,
    };

    let (tasks, total) = tokio::try_join!(
        state.db.list_completed_tasks(&filter),
        state.db.count_completed_tasks(filter.user_id.as_deref()),
    )?;

    Ok(Json(json!({
        "success": true,
        "data": tasks,
        "pagination": Pagination::new(request, total),
    })))
}

async fn get_own(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: IdParam,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;
    let task = state
        .db
        .get_completed_task(&id, Some(&caller.id))
        .await
        .map_err(|e| not_found_as(e, TASK_NOT_FOUND))?;
    Ok(Json(json!({ "success": true, "data": task })))
}

async fn get_any(
    State(state): State<AppState>,
    id: IdParam,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;
    let task = state
        .db
        .get_completed_task(&id, None)
        .await
        .map_err(|e| not_found_as(e, TASK_NOT_FOUND))?;
    Ok(Json(json!({ "success": true, "data": task })))
}

async fn download_own(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    id: IdParam,
) -> Result<Response, AppError> {
    let Path(id) = id?;
    download(&state, &id, Some(&caller.id)).await
}

async fn download_any(
    State(state): State<AppState>,
    id: IdParam,
) -> Result<Response, AppError> {
    let Path(id) = id?;
    download(&state, &id, None).await
}

async fn download(state: &AppState, id: &str, owner: Option<&str>) -> Result<Response, AppError> {
    let task = state
        .db
        .get_completed_task(id, owner)
        .await
        .map_err(|e| not_found_as(e, FILE_NOT_FOUND))?;
    let file = task
        .downloadable_file()
        .ok_or_else(|| AppError::not_found(FILE_NOT_FOUND))?;
    tracing::info!(task_id = %task.id, user_id = %task.user_id, "streaming completed task file");
    send_file(file).await
}

/// Stream `file` from local disk. The stored path is trusted as-is.
async fn send_file(file: &TaskFile) -> Result<Response, AppError> {
    let path = file
        .download_path()
        .ok_or_else(|| AppError::not_found(FILE_NOT_FOUND))?;
    let name = file.download_name().unwrap_or_else(|| "download".into());

    let handle = tokio::fs::File::open(path).await.map_err(|e| {
        tracing::error!("open {path}: {e}");
        AppError::internal(DOWNLOAD_FAILED)
    })?;
    let meta = handle.metadata().await.map_err(|e| {
        tracing::error!("stat {path}: {e}");
        AppError::internal(DOWNLOAD_FAILED)
    })?;
    if !meta.is_file() {
        tracing::error!("{path} is not a regular file");
        return Err(AppError::internal(DOWNLOAD_FAILED));
    }

    Response::builder()
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, meta.len())
        .header(CONTENT_DISPOSITION, content_disposition(&name))
        .body(Body::from_stream(ReaderStream::new(handle)))
        .map_err(|e| {
            tracing::error!("build download response: {e}");
            AppError::internal(DOWNLOAD_FAILED)
        })
}

/// `attachment; filename="..."`, with an RFC 5987 `filename*` when the name
/// is not plain printable ASCII.
fn content_disposition(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    let mut value = format!("attachment; filename=\"{fallback}\"");
    if fallback != name {
        value.push_str(&format!("; filename*=UTF-8''{}", urlencoding::encode(name)));
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn not_found_as(e: DbError, message: &str) -> AppError {
    match e {
        DbError::NotFound(_) => AppError::not_found(message),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use handin_core::api_key::ApiKey;
    use handin_core::caller::Role;
    use handin_core::completed_task::{CompletedTask, CreateCompletedTask};
    use handin_db::Database;

    use super::*;
    use crate::auth::build_auth_config_with_key;
    use crate::routes::{build_router, InnerAppState};
    use crate::test_helpers::{body_json, get, TestApp, MAX_PAGE_LIMIT};

    const BASE: &str = "/api/completed-tasks";

    fn ids(body: &Value) -> Vec<String> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn content_disposition_plain_name() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn content_disposition_escapes_quotes_and_unicode() {
        let v = content_disposition("résumé \"final\".pdf");
        let s = v.to_str().unwrap();
        assert!(s.starts_with("attachment; filename=\"r_sum_ _final_.pdf\""));
        assert!(s.contains("filename*=UTF-8''r%C3%A9sum%C3%A9%20%22final%22.pdf"));
    }

    #[tokio::test]
    async fn list_own_second_page_of_25() {
        let app = TestApp::new().await;
        app.seed_tasks("u1", 25).await;
        app.seed_tasks("u2", 4).await;
        let key = app.user_key("u1").await;

        let resp = get(&app.router(), &format!("{BASE}/my-completed?page=2&limit=20"), &key).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 5);
        assert_eq!(
            body["pagination"],
            json!({ "page": 2, "limit": 20, "total": 25, "totalPages": 2 })
        );
        assert!(body["data"]
            .as_array()
            .unwrap()
            .iter()
            .all(|t| t["userId"] == "u1"));
    }

    #[tokio::test]
    async fn list_own_defaults_when_params_missing_or_invalid() {
        let app = TestApp::new().await;
        app.seed_tasks("u1", 3).await;
        let key = app.user_key("u1").await;

        for uri in [
            format!("{BASE}/my-completed"),
            format!("{BASE}/my-completed?page=abc&limit="),
            format!("{BASE}/my-completed?page=0&limit=0"),
            format!("{BASE}/my-completed?page=-4"),
        ] {
            let body = body_json(get(&app.router(), &uri, &key).await).await;
            assert_eq!(body["pagination"]["page"], 1, "{uri}");
            assert_eq!(body["pagination"]["limit"], 20, "{uri}");
            assert_eq!(body["data"].as_array().unwrap().len(), 3, "{uri}");
        }
    }

    #[tokio::test]
    async fn list_own_caps_limit() {
        let app = TestApp::new().await;
        app.seed_tasks("u1", 2).await;
        let key = app.user_key("u1").await;

        let body = body_json(
            get(&app.router(), &format!("{BASE}/my-completed?limit=100000"), &key).await,
        )
        .await;
        assert_eq!(body["pagination"]["limit"], crate::test_helpers::MAX_PAGE_LIMIT);
    }

    #[tokio::test]
    async fn list_own_is_newest_first_and_repeatable() {
        let app = TestApp::new().await;
        let seeded = app.seed_tasks("u1", 6).await;
        let key = app.user_key("u1").await;
        let uri = format!("{BASE}/my-completed?limit=4");

        let first = body_json(get(&app.router(), &uri, &key).await).await;
        let second = body_json(get(&app.router(), &uri, &key).await).await;
        assert_eq!(first, second);

        let mut newest: Vec<&CompletedTask> = seeded.iter().collect();
        newest.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        let expected: Vec<String> = newest.iter().take(4).map(|t| t.id.clone()).collect();
        assert_eq!(ids(&first), expected);
    }

    #[tokio::test]
    async fn list_own_returned_count_never_exceeds_limit() {
        let app = TestApp::new().await;
        app.seed_tasks("u1", 13).await;
        let key = app.user_key("u1").await;

        for limit in 1..=15i64 {
            for page in 1..=4i64 {
                let uri = format!("{BASE}/my-completed?page={page}&limit={limit}");
                let body = body_json(get(&app.router(), &uri, &key).await).await;
                let n = body["data"].as_array().unwrap().len() as i64;
                assert!(n <= limit);
                assert_eq!(body["pagination"]["totalPages"], (13 + limit - 1) / limit);
            }
        }
    }

    #[tokio::test]
    async fn get_own_returns_record() {
        let app = TestApp::new().await;
        let task = app.seed_task("u1", None).await;
        let key = app.user_key("u1").await;

        let resp = get(&app.router(), &format!("{BASE}/my-completed/{}", task.id), &key).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], task.id.as_str());
        assert_eq!(body["data"]["assignment"], "essay");
    }

    #[tokio::test]
    async fn get_own_hides_other_users_records() {
        let app = TestApp::new().await;
        let task = app.seed_task("u2", None).await;
        let key = app.user_key("u1").await;

        let resp = get(&app.router(), &format!("{BASE}/my-completed/{}", task.id), &key).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], TASK_NOT_FOUND);
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn get_own_unknown_id_is_404() {
        let app = TestApp::new().await;
        let key = app.user_key("u1").await;
        let resp = get(&app.router(), &format!("{BASE}/my-completed/nope"), &key).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_routes_refuse_non_admins() {
        let app = TestApp::new().await;
        let task = app.seed_task("u1", None).await;
        let key = app.user_key("u1").await;

        for uri in [
            format!("{BASE}/admin/all"),
            format!("{BASE}/admin/{}", task.id),
            format!("{BASE}/admin/{}/download", task.id),
        ] {
            let resp = get(&app.router(), &uri, &key).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{uri}");
            let body = body_json(resp).await;
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], "Admin access required");
            assert!(body.get("data").is_none());
        }
    }

    #[tokio::test]
    async fn admin_lists_everyone() {
        let app = TestApp::new().await;
        app.seed_tasks("u1", 3).await;
        app.seed_tasks("u2", 2).await;
        let key = app.admin_key("a1").await;

        let body = body_json(get(&app.router(), &format!("{BASE}/admin/all?limit=4"), &key).await).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 4);
        assert_eq!(
            body["pagination"],
            json!({ "page": 1, "limit": 4, "total": 5, "totalPages": 2 })
        );
    }

    #[tokio::test]
    async fn admin_gets_any_users_record() {
        let app = TestApp::new().await;
        let task = app.seed_task("u1", None).await;
        let key = app.admin_key("a1").await;

        let resp = get(&app.router(), &format!("{BASE}/admin/{}", task.id), &key).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"], serde_json::to_value(&task).unwrap());

        let resp = get(&app.router(), &format!("{BASE}/admin/missing"), &key).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["message"], TASK_NOT_FOUND);
    }

    #[tokio::test]
    async fn download_own_streams_file_with_original_name() {
        let app = TestApp::new().await;
        let path = app.write_file("stored-1", b"hello submission");
        let task = app
            .seed_task(
                "u1",
                Some(TaskFile {
                    path: Some(path),
                    filename: Some("stored-1".into()),
                    original_name: Some("essay.txt".into()),
                }),
            )
            .await;
        let key = app.user_key("u1").await;

        let resp = get(
            &app.router(),
            &format!("{BASE}/my-completed/{}/download", task.id),
            &key,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"essay.txt\""
        );
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/octet-stream");
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello submission");
    }

    #[tokio::test]
    async fn download_falls_back_to_stored_filename() {
        let app = TestApp::new().await;
        let path = app.write_file("blob", b"x");
        let task = app
            .seed_task(
                "u1",
                Some(TaskFile {
                    path: Some(path),
                    filename: Some("stored.bin".into()),
                    original_name: None,
                }),
            )
            .await;
        let key = app.admin_key("a1").await;

        let resp = get(&app.router(), &format!("{BASE}/admin/{}/download", task.id), &key).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"stored.bin\""
        );
    }

    #[tokio::test]
    async fn download_without_file_is_404() {
        let app = TestApp::new().await;
        let task = app.seed_task("u1", None).await;
        let key = app.user_key("u1").await;

        let resp = get(
            &app.router(),
            &format!("{BASE}/my-completed/{}/download", task.id),
            &key,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["message"], FILE_NOT_FOUND);
    }

    #[tokio::test]
    async fn download_without_path_is_404() {
        let app = TestApp::new().await;
        let task = app
            .seed_task(
                "u1",
                Some(TaskFile {
                    path: None,
                    filename: Some("orphan.txt".into()),
                    original_name: Some("orphan.txt".into()),
                }),
            )
            .await;
        let key = app.user_key("u1").await;

        let resp = get(
            &app.router(),
            &format!("{BASE}/my-completed/{}/download", task.id),
            &key,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["message"], FILE_NOT_FOUND);
    }

    #[tokio::test]
    async fn download_of_other_users_record_is_404() {
        let app = TestApp::new().await;
        let path = app.write_file("secret", b"not yours");
        let task = app
            .seed_task(
                "u2",
                Some(TaskFile {
                    path: Some(path),
                    filename: Some("secret".into()),
                    original_name: None,
                }),
            )
            .await;
        let key = app.user_key("u1").await;

        let resp = get(
            &app.router(),
            &format!("{BASE}/my-completed/{}/download", task.id),
            &key,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["message"], FILE_NOT_FOUND);
    }

    #[tokio::test]
    async fn download_of_missing_file_on_disk_is_500() {
        let app = TestApp::new().await;
        let task = app
            .seed_task(
                "u1",
                Some(TaskFile {
                    path: Some("/definitely/not/here.bin".into()),
                    filename: Some("here.bin".into()),
                    original_name: None,
                }),
            )
            .await;
        let key = app.user_key("u1").await;

        let resp = get(
            &app.router(),
            &format!("{BASE}/my-completed/{}/download", task.id),
            &key,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["message"], DOWNLOAD_FAILED);
        assert_eq!(body["statusCode"], 500);
    }

    #[tokio::test]
    async fn download_of_directory_is_500() {
        let app = TestApp::new().await;
        let dir = app.files.path().to_string_lossy().to_string();
        let task = app
            .seed_task(
                "u1",
                Some(TaskFile {
                    path: Some(dir),
                    filename: None,
                    original_name: None,
                }),
            )
            .await;
        let key = app.admin_key("a1").await;

        let resp = get(&app.router(), &format!("{BASE}/admin/{}/download", task.id), &key).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["message"], DOWNLOAD_FAILED);
    }

    #[test]
    fn page_query_keeps_first_repeated_value() {
        let q = PageQuery::from_pairs(vec![
            ("page".into(), "2".into()),
            ("sort".into(), "asc".into()),
            ("page".into(), "7".into()),
            ("limit".into(), "5".into()),
        ]);
        assert_eq!(q.page.as_deref(), Some("2"));
        assert_eq!(q.limit.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn repeated_page_params_use_first_value() {
        let app = TestApp::new().await;
        app.seed_tasks("u1", 25).await;
        let key = app.user_key("u1").await;

        let resp = get(
            &app.router(),
            &format!("{BASE}/my-completed?page=2&page=3&limit=20&limit=5"),
            &key,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 5);
        assert_eq!(
            body["pagination"],
            json!({ "page": 2, "limit": 20, "total": 25, "totalPages": 2 })
        );
    }

    #[tokio::test]
    async fn undecodable_id_renders_envelope() {
        let app = TestApp::new().await;
        let key = app.user_key("u1").await;

        let resp = get(&app.router(), &format!("{BASE}/my-completed/%FF"), &key).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["statusCode"], 400);
        assert!(body["message"].is_string());
    }

    #[derive(Clone, Copy, PartialEq)]
    enum FailOn {
        List,
        Count,
        Get,
    }

    /// Delegates to a real database, except for one query that always fails.
    struct FailingDb {
        inner: Arc<dyn Database>,
        fail_on: FailOn,
    }

    impl FailingDb {
        fn check(&self, op: FailOn) -> Result<(), DbError> {
            if self.fail_on == op {
                Err(DbError::Internal("connection reset".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Database for FailingDb {
        async fn create_completed_task(
            &self,
            input: &CreateCompletedTask,
        ) -> Result<CompletedTask, DbError> {
            self.inner.create_completed_task(input).await
        }
        async fn get_completed_task(
            &self,
            id: &str,
            owner: Option<&str>,
        ) -> Result<CompletedTask, DbError> {
            self.check(FailOn::Get)?;
            self.inner.get_completed_task(id, owner).await
        }
        async fn list_completed_tasks(
            &self,
            filter: &CompletedTaskFilter,
        ) -> Result<Vec<CompletedTask>, DbError> {
            self.check(FailOn::List)?;
            self.inner.list_completed_tasks(filter).await
        }
        async fn count_completed_tasks(&self, user_id: Option<&str>) -> Result<i64, DbError> {
            self.check(FailOn::Count)?;
            self.inner.count_completed_tasks(user_id).await
        }
        async fn insert_api_key(
            &self,
            name: &str,
            key_hash: &str,
            user_id: &str,
            role: Role,
        ) -> Result<ApiKey, DbError> {
            self.inner.insert_api_key(name, key_hash, user_id, role).await
        }
        async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError> {
            self.inner.find_api_key_by_hash(key_hash).await
        }
        async fn touch_api_key(&self, id: &str) -> Result<(), DbError> {
            self.inner.touch_api_key(id).await
        }
        async fn has_api_keys(&self) -> Result<bool, DbError> {
            self.inner.has_api_keys().await
        }
        async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
            self.inner.list_api_keys().await
        }
        async fn delete_api_key(&self, id: &str) -> Result<(), DbError> {
            self.inner.delete_api_key(id).await
        }
    }

    /// Router over a seeded database with one failing query, plus the admin
    /// key and the id of a record that has a file on disk.
    async fn failing_router(fail_on: FailOn) -> (Router, String, String, TestApp) {
        let app = TestApp::new().await;
        let path = app.write_file("kept", b"bytes");
        let task = app
            .seed_task(
                "admin",
                Some(TaskFile {
                    path: Some(path),
                    filename: Some("kept".into()),
                    original_name: None,
                }),
            )
            .await;
        let db: Arc<dyn Database> = Arc::new(FailingDb {
            inner: app.db().clone(),
            fail_on,
        });
        let auth = build_auth_config_with_key(db.clone(), Some(&app.env_admin_key), None).await;
        let router = build_router(Arc::new(InnerAppState {
            db,
            auth,
            max_page_limit: MAX_PAGE_LIMIT,
        }));
        (router, app.env_admin_key.clone(), task.id, app)
    }

    async fn assert_generic_500(resp: Response) {
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(
            body,
            json!({ "success": false, "statusCode": 500, "message": "Something went wrong" })
        );
    }

    #[tokio::test]
    async fn list_fails_whole_when_either_query_fails() {
        for fail_on in [FailOn::List, FailOn::Count] {
            let (router, key, _, _app) = failing_router(fail_on).await;
            for uri in [format!("{BASE}/my-completed"), format!("{BASE}/admin/all")] {
                let resp = get(&router, &uri, &key).await;
                assert_generic_500(resp).await;
            }
        }
    }

    #[tokio::test]
    async fn lookup_failure_is_generic_500() {
        let (router, key, id, _app) = failing_router(FailOn::Get).await;
        for uri in [
            format!("{BASE}/my-completed/{id}"),
            format!("{BASE}/admin/{id}"),
            format!("{BASE}/my-completed/{id}/download"),
            format!("{BASE}/admin/{id}/download"),
        ] {
            let resp = get(&router, &uri, &key).await;
            assert_generic_500(resp).await;
        }
    }

    #[tokio::test]
    async fn unaffected_routes_still_work_over_failing_db() {
        let (router, key, id, _app) = failing_router(FailOn::Count).await;
        let resp = get(&router, &format!("{BASE}/admin/{id}/download"), &key).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

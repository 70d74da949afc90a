pub mod completed_tasks;
pub mod health;

use std::sync::Arc;

use axum::{middleware, Router};
use handin_db::Database;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthConfig};

pub struct InnerAppState {
    pub db: Arc<dyn Database>,
    pub auth: Arc<AuthConfig>,
    /// Largest `limit` a listing request may ask for.
    pub max_page_limit: i64,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new().merge(health::routes());

    let protected = Router::new()
        .merge(completed_tasks::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub mod auth;
pub mod config;
pub mod error;
pub mod ping;
pub mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use handin_db::Database;
use tokio::net::TcpListener;

use auth::AuthConfig;
use routes::InnerAppState;

pub async fn serve(
    listener: TcpListener,
    db: Arc<dyn Database>,
    auth: Arc<AuthConfig>,
    max_page_limit: i64,
) -> Result<()> {
    let state = Arc::new(InnerAppState {
        db,
        auth,
        max_page_limit,
    });
    let app = routes::build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

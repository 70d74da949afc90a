use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use handin_core::caller::{Caller, Role};
use handin_db::Database;

use crate::error::AppError;
use crate::routes::AppState;

const INVALID_KEY: &str = "missing or invalid API key";

/// Authentication configuration.
pub struct AuthConfig {
    /// SHA-256 hash of the `HANDIN_ADMIN_KEY` env var (if set).
    pub env_key_hash: Option<String>,
    /// User id the env key authenticates as. The env key always carries the
    /// admin role.
    pub env_key_user_id: String,
    /// Database handle for DB-backed API keys.
    pub db: Arc<dyn Database>,
}

/// SHA-256 hash a raw key, returning the hex-encoded digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generate a new API key: `hk_` + 43 chars of base62-encoded random bytes.
pub fn generate_api_key() -> String {
    use rand::Rng;
    const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let random_part: String = (0..43)
        .map(|_| {
            let idx = rng.gen_range(0..BASE62.len());
            BASE62[idx] as char
        })
        .collect();
    format!("hk_{random_part}")
}

/// Axum middleware that resolves the bearer token to a [`Caller`] and stores
/// it in the request extensions.
///
/// Every route behind this layer requires a valid
/// `Authorization: Bearer <token>` header.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth = &state.auth;

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return AppError::unauthorized(INVALID_KEY).into_response(),
    };

    let token_hash = sha256_hex(token);

    // Check env key (constant-time comparison via hash equality)
    if let Some(ref env_hash) = auth.env_key_hash {
        if constant_time_eq(&token_hash, env_hash) {
            request
                .extensions_mut()
                .insert(Caller::new(auth.env_key_user_id.clone(), Role::Admin));
            return next.run(request).await;
        }
    }

    match auth.db.find_api_key_by_hash(&token_hash).await {
        Ok(Some(api_key)) => {
            // Fire-and-forget: update last_used_at
            let db = auth.db.clone();
            let key_id = api_key.id.clone();
            tokio::spawn(async move {
                if let Err(e) = db.touch_api_key(&key_id).await {
                    tracing::warn!("failed to touch api key {key_id}: {e}");
                }
            });
            request
                .extensions_mut()
                .insert(Caller::new(api_key.user_id, api_key.role));
            next.run(request).await
        }
        Ok(None) => AppError::unauthorized(INVALID_KEY).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Route layer for admin-scoped routes. Must sit inside [`auth_middleware`].
pub async fn require_admin(request: Request, next: Next) -> Response {
    match request.extensions().get::<Caller>() {
        Some(caller) if caller.is_admin() => next.run(request).await,
        Some(caller) => {
            tracing::debug!(user_id = %caller.id, "non-admin caller refused");
            AppError::forbidden("Admin access required").into_response()
        }
        None => AppError::unauthorized(INVALID_KEY).into_response(),
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Build the auth configuration from `HANDIN_ADMIN_KEY` and
/// `HANDIN_ADMIN_USER_ID` plus DB state.
pub async fn build_auth_config(db: Arc<dyn Database>) -> Arc<AuthConfig> {
    let env_key = std::env::var("HANDIN_ADMIN_KEY").ok();
    let env_user = std::env::var("HANDIN_ADMIN_USER_ID").ok();
    build_auth_config_with_key(db, env_key.as_deref(), env_user.as_deref()).await
}

/// Build auth config from explicit values (testable without env mutation).
pub async fn build_auth_config_with_key(
    db: Arc<dyn Database>,
    env_key: Option<&str>,
    env_user_id: Option<&str>,
) -> Arc<AuthConfig> {
    let env_key_hash = env_key.filter(|k| !k.is_empty()).map(sha256_hex);

    if env_key_hash.is_none() && !db.has_api_keys().await.unwrap_or(false) {
        tracing::warn!("no API keys configured; every request will be rejected");
    }

    Arc::new(AuthConfig {
        env_key_hash,
        env_key_user_id: env_user_id
            .filter(|u| !u.is_empty())
            .unwrap_or("admin")
            .to_string(),
        db,
    })
}

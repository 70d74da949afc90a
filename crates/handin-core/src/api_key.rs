use serde::Serialize;

use crate::caller::Role;

#[derive(Debug, Clone, Serialize)]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    pub key_hash: String,
    /// The user this key authenticates as.
    pub user_id: String,
    pub role: Role,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

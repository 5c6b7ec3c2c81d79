use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. `email` and `phone` are unique across the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// bcrypt hash. Serialized for storage; handlers strip it from
    /// response bodies.
    pub password: String,
    pub created_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single-owner to-do item with a deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalTask {
    pub id: String,
    /// Owner's user id.
    pub user: String,
    pub title: String,
    /// Calendar date as sent by the client, e.g. "2025-12-01".
    pub end_date: String,
    /// Time string like "14:30" or "02:00 PM".
    pub end_time: String,
    #[serde(default)]
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named participant in a team task. Members are tracked by display name,
/// not account id; names are unique within a task under case/whitespace-
/// insensitive comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub name: String,
    /// Cumulative progress, clamped to [0, 100].
    #[serde(default)]
    pub total_progress: i32,
    /// Transient daily delta, reset to 0 once folded into `total_progress`.
    #[serde(default)]
    pub current_progress: i32,
    /// Set once the member has folded daily progress at least once.
    #[serde(default)]
    pub has_updated: bool,
}

impl Member {
    pub fn new(name: &str) -> Self {
        Member {
            name: name.trim().to_string(),
            total_progress: 0,
            current_progress: 0,
            has_updated: false,
        }
    }

    /// Case/whitespace-insensitive key used for roster uniqueness and for
    /// matching the acting user against their own entry.
    pub fn normalized_name(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

/// A collaborative task identified by a human-chosen code (`task_id`),
/// always stored upper-cased. `progress` is the rounded mean of the
/// members' `total_progress`, recomputed after every accepted write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTask {
    pub id: String,
    /// Human-chosen unique code, upper-cased on store and lookup.
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub time: String,
    pub members: Vec<Member>,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub is_completed: bool,
    /// Creator's user id; sole authority over details and roster.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

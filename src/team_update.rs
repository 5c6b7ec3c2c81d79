// src/team_update.rs
//
// Update gating and progress aggregation for team tasks. Everything here is
// pure so PUT /tasks/{taskId} stays a thin fetch-validate-write pipeline.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::ApiError;
use crate::models::{Member, TeamTask};

/// The proposed new representation of a team task, as resent in full by the
/// client. Parsed by hand from the raw body so missing fields surface as the
/// API's own validation messages rather than a deserializer error.
#[derive(Debug)]
pub struct TeamTaskPatch {
    /// Human code, if the client resent it.
    pub task_id: Option<String>,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub time: String,
    pub members: Vec<Member>,
    pub is_completed: Option<bool>,
}

fn required_str(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

impl TeamTaskPatch {
    pub fn from_body(body: &Value) -> Result<Self, ApiError> {
        let missing = ["title", "description", "startDate", "endDate", "time", "members", "progress"]
            .iter()
            .any(|k| body.get(*k).is_none());
        if missing {
            return Err(ApiError::Validation(
                "All fields (title, description, startDate, endDate, time, members, progress) \
                 are required for team task update"
                    .to_string(),
            ));
        }

        let members_value = &body["members"];
        if !members_value.is_array() {
            return Err(ApiError::Validation("Members must be an array".to_string()));
        }
        let members: Vec<Member> = serde_json::from_value(members_value.clone())
            .map_err(|_| ApiError::Validation("Invalid member entry".to_string()))?;

        let title = required_str(body, "title");
        let description = required_str(body, "description");
        let start_date = required_str(body, "startDate");
        let end_date = required_str(body, "endDate");
        let time = required_str(body, "time");
        match (title, description, start_date, end_date, time) {
            (Some(title), Some(description), Some(start_date), Some(end_date), Some(time)) => {
                Ok(TeamTaskPatch {
                    task_id: required_str(body, "taskId"),
                    title,
                    description,
                    start_date,
                    end_date,
                    time,
                    members,
                    is_completed: body.get("isCompleted").and_then(Value::as_bool),
                })
            }
            _ => Err(ApiError::Validation(
                "All fields (title, description, startDate, endDate, time, members, progress) \
                 are required for team task update"
                    .to_string(),
            )),
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn clamp_progress(value: i32) -> i32 {
    value.clamp(0, 100)
}

/// Adds the transient daily delta into the durable total, clamped, and
/// resets the delta.
pub fn fold_daily_progress(member: &mut Member) {
    member.total_progress = clamp_progress(member.total_progress + member.current_progress);
    member.current_progress = 0;
    member.has_updated = true;
}

/// Rounded mean of the members' total progress; 0 for an empty roster.
pub fn recompute_progress(members: &[Member]) -> i32 {
    if members.is_empty() {
        return 0;
    }
    let sum: i32 = members.iter().map(|m| m.total_progress).sum();
    (sum as f64 / members.len() as f64).round() as i32
}

/// Decides whether `actor` may replace `stored` with `patch`.
///
/// The creator is trusted for every field. Anyone else must resend the task
/// details and roster byte-for-byte, except the progress pair on their own
/// roster entry (matched by display name, case-insensitive). The member
/// comparison is position-aligned, so reordering the roster without touching
/// any entry is still rejected for non-creators.
pub fn authorize_update(
    stored: &TeamTask,
    patch: &TeamTaskPatch,
    actor_id: &str,
    actor_name: &str,
) -> Result<(), ApiError> {
    if actor_id == stored.created_by {
        return Ok(());
    }

    let details_changed = patch.title != stored.title
        || patch.description != stored.description
        || patch.start_date != stored.start_date
        || patch.end_date != stored.end_date
        || patch.time != stored.time
        || patch
            .task_id
            .as_ref()
            .is_some_and(|code| code.to_uppercase() != stored.task_id);
    if details_changed {
        return Err(ApiError::Permission(
            "Only the task creator can change task details".to_string(),
        ));
    }

    if patch.members.len() != stored.members.len() {
        return Err(ApiError::Permission(
            "Only the task creator can add or remove members".to_string(),
        ));
    }

    let actor_key = normalize(actor_name);
    for (proposed, existing) in patch.members.iter().zip(stored.members.iter()) {
        if proposed.name != existing.name {
            return Err(ApiError::Permission(
                "Only the task creator can modify the member list".to_string(),
            ));
        }
        if normalize(&existing.name) == actor_key {
            continue;
        }
        if proposed.total_progress != existing.total_progress
            || proposed.current_progress != existing.current_progress
        {
            return Err(ApiError::Permission(
                "You can only update your own progress".to_string(),
            ));
        }
    }

    Ok(())
}

/// Fails if two roster entries collide under case/whitespace-insensitive
/// name comparison.
pub fn validate_roster(members: &[Member]) -> Result<(), ApiError> {
    let mut seen = Vec::with_capacity(members.len());
    for member in members {
        let key = member.normalized_name();
        if key.is_empty() {
            return Err(ApiError::Validation("Member name is required".to_string()));
        }
        if seen.contains(&key) {
            return Err(ApiError::Validation(
                "Member names must be unique within a task".to_string(),
            ));
        }
        seen.push(key);
    }
    Ok(())
}

/// Builds the replacement document from an authorized patch: clamps every
/// progress pair, folds the actor's own daily delta, and recomputes the
/// aggregate. The caller's `progress` field is never trusted.
pub fn apply_update(
    stored: &TeamTask,
    patch: TeamTaskPatch,
    actor_name: &str,
    now: DateTime<Utc>,
) -> Result<TeamTask, ApiError> {
    validate_roster(&patch.members)?;

    let actor_key = normalize(actor_name);
    let mut members = patch.members;
    for member in members.iter_mut() {
        member.total_progress = clamp_progress(member.total_progress);
        member.current_progress = clamp_progress(member.current_progress);
        if member.normalized_name() == actor_key {
            fold_daily_progress(member);
        }
    }
    let progress = recompute_progress(&members);

    Ok(TeamTask {
        id: stored.id.clone(),
        task_id: patch
            .task_id
            .map(|code| code.trim().to_uppercase())
            .unwrap_or_else(|| stored.task_id.clone()),
        title: patch.title,
        description: patch.description,
        start_date: patch.start_date,
        end_date: patch.end_date,
        time: patch.time,
        members,
        progress,
        is_completed: patch.is_completed.unwrap_or(stored.is_completed),
        created_by: stored.created_by.clone(),
        created_at: stored.created_at,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(name: &str, total: i32, current: i32) -> Member {
        Member {
            name: name.to_string(),
            total_progress: total,
            current_progress: current,
            has_updated: false,
        }
    }

    fn stored_task() -> TeamTask {
        TeamTask {
            id: "t-1".to_string(),
            task_id: "ABC123".to_string(),
            title: "Ship release".to_string(),
            description: "Cut and ship 2.0".to_string(),
            start_date: "2025-12-01".to_string(),
            end_date: "2025-12-15".to_string(),
            time: "17:00".to_string(),
            members: vec![member("Alice", 0, 0), member("Bob", 0, 0)],
            progress: 0,
            is_completed: false,
            created_by: "creator-1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn patch_from(task: &TeamTask) -> TeamTaskPatch {
        TeamTaskPatch {
            task_id: Some(task.task_id.clone()),
            title: task.title.clone(),
            description: task.description.clone(),
            start_date: task.start_date.clone(),
            end_date: task.end_date.clone(),
            time: task.time.clone(),
            members: task.members.clone(),
            is_completed: Some(task.is_completed),
        }
    }

    #[test]
    fn recompute_progress_cases() {
        assert_eq!(recompute_progress(&[]), 0);
        assert_eq!(recompute_progress(&[member("A", 100, 0)]), 100);
        assert_eq!(
            recompute_progress(&[member("A", 0, 0), member("B", 100, 0)]),
            50
        );
        assert_eq!(
            recompute_progress(&[member("A", 40, 0), member("B", 0, 0)]),
            20
        );
    }

    #[test]
    fn fold_clamps_at_one_hundred() {
        let mut m = member("A", 90, 20);
        fold_daily_progress(&mut m);
        assert_eq!(m.total_progress, 100);
        assert_eq!(m.current_progress, 0);
        assert!(m.has_updated);
    }

    #[test]
    fn creator_may_change_anything() {
        let stored = stored_task();
        let mut patch = patch_from(&stored);
        patch.title = "Renamed".to_string();
        patch.members = vec![member("Carol", 0, 0)];
        assert!(authorize_update(&stored, &patch, "creator-1", "Creator").is_ok());
    }

    #[test]
    fn non_creator_cannot_change_details() {
        let stored = stored_task();
        for mutate in [
            |p: &mut TeamTaskPatch| p.title = "x".to_string(),
            |p: &mut TeamTaskPatch| p.description = "x".to_string(),
            |p: &mut TeamTaskPatch| p.start_date = "2025-01-01".to_string(),
            |p: &mut TeamTaskPatch| p.end_date = "2025-01-02".to_string(),
            |p: &mut TeamTaskPatch| p.time = "09:00".to_string(),
            |p: &mut TeamTaskPatch| p.task_id = Some("OTHER1".to_string()),
        ] {
            let mut patch = patch_from(&stored);
            mutate(&mut patch);
            let err = authorize_update(&stored, &patch, "member-1", "Alice").unwrap_err();
            assert!(matches!(err, ApiError::Permission(_)), "got {:?}", err);
        }
    }

    #[test]
    fn resent_code_compares_case_insensitively() {
        let stored = stored_task();
        let mut patch = patch_from(&stored);
        patch.task_id = Some("abc123".to_string());
        assert!(authorize_update(&stored, &patch, "member-1", "Alice").is_ok());
    }

    #[test]
    fn non_creator_cannot_resize_roster() {
        let stored = stored_task();
        let mut patch = patch_from(&stored);
        patch.members.push(member("Carol", 0, 0));
        let err = authorize_update(&stored, &patch, "member-1", "Alice").unwrap_err();
        assert!(matches!(err, ApiError::Permission(_)));
    }

    #[test]
    fn non_creator_cannot_touch_other_members_progress() {
        let stored = stored_task();
        let mut patch = patch_from(&stored);
        // Bob tries to bump Alice's total in the same call.
        patch.members[0].total_progress = 60;
        let err = authorize_update(&stored, &patch, "member-2", "Bob").unwrap_err();
        assert!(matches!(err, ApiError::Permission(_)));
    }

    #[test]
    fn member_may_update_own_progress() {
        let stored = stored_task();
        let mut patch = patch_from(&stored);
        patch.members[0].current_progress = 40;
        assert!(authorize_update(&stored, &patch, "member-1", "alice").is_ok());
    }

    // Reordering the roster is position-aligned, so even an unchanged roster
    // in a different order reads as a structural change. Intentional.
    #[test]
    fn reordered_roster_is_rejected_for_non_creators() {
        let stored = stored_task();
        let mut patch = patch_from(&stored);
        patch.members.swap(0, 1);
        let err = authorize_update(&stored, &patch, "member-1", "Alice").unwrap_err();
        assert!(matches!(err, ApiError::Permission(_)));
    }

    #[test]
    fn apply_folds_actor_and_recomputes_aggregate() {
        let stored = stored_task();
        let mut patch = patch_from(&stored);
        patch.members[0].current_progress = 40;
        let updated = apply_update(&stored, patch, "Alice", Utc::now()).unwrap();
        assert_eq!(updated.members[0].total_progress, 40);
        assert_eq!(updated.members[0].current_progress, 0);
        assert!(updated.members[0].has_updated);
        assert_eq!(updated.members[1].total_progress, 0);
        assert_eq!(updated.progress, 20);
    }

    #[test]
    fn apply_ignores_caller_supplied_aggregate() {
        let stored = stored_task();
        let body = json!({
            "taskId": "abc123",
            "title": stored.title,
            "description": stored.description,
            "startDate": stored.start_date,
            "endDate": stored.end_date,
            "time": stored.time,
            "members": [
                { "name": "Alice", "totalProgress": 40, "currentProgress": 0 },
                { "name": "Bob", "totalProgress": 0, "currentProgress": 0 }
            ],
            "progress": 99
        });
        let patch = TeamTaskPatch::from_body(&body).unwrap();
        let updated = apply_update(&stored, patch, "Alice", Utc::now()).unwrap();
        assert_eq!(updated.progress, 20);
        assert_eq!(updated.task_id, "ABC123");
    }

    #[test]
    fn apply_clamps_out_of_range_progress() {
        let stored = stored_task();
        let mut patch = patch_from(&stored);
        patch.members[0].total_progress = 250;
        patch.members[1].current_progress = -10;
        let updated = apply_update(&stored, patch, "Creator", Utc::now()).unwrap();
        assert_eq!(updated.members[0].total_progress, 100);
        assert_eq!(updated.members[1].current_progress, 0);
    }

    #[test]
    fn roster_names_must_be_unique() {
        let members = vec![member("Alice", 0, 0), member(" alice ", 0, 0)];
        assert!(matches!(
            validate_roster(&members),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn patch_requires_every_field() {
        let body = json!({ "title": "x", "members": [] });
        let err = TeamTaskPatch::from_body(&body).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn patch_rejects_non_array_members() {
        let body = json!({
            "title": "x", "description": "y", "startDate": "2025-01-01",
            "endDate": "2025-01-02", "time": "10:00",
            "members": "Alice,Bob", "progress": 0
        });
        let err = TeamTaskPatch::from_body(&body).unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref msg) if msg == "Members must be an array"));
    }
}

// src/tasks.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use log::{debug, info};
use mongodb::bson::doc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{current_user_id, find_user};
use crate::errors::ApiError;
use crate::models::{Member, PersonalTask, TeamTask};
use crate::team_update::{
    apply_update, authorize_update, recompute_progress, validate_roster, TeamTaskPatch,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePersonalTaskRequest {
    pub title: String,
    pub end_date: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct MemberName {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamTaskRequest {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub time: String,
    pub members: Vec<MemberName>,
}

/// Typed create dispatch. The original API distinguished the two shapes by
/// counting body keys; the untagged enum keeps the same observable contract
/// (a three-field body is personal, the seven-field body is a team task)
/// without the raw key count.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreateTaskRequest {
    Team(CreateTeamTaskRequest),
    Personal(CreatePersonalTaskRequest),
}

pub fn parse_create_request(body: &Value) -> Result<CreateTaskRequest, ApiError> {
    serde_json::from_value(body.clone())
        .map_err(|_| ApiError::Validation("Invalid task data provided".to_string()))
}

// GET /tasks
pub async fn get_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user_id(&req)?;

    let personal_coll = data.mongodb.db.collection::<PersonalTask>("tasks");
    let mut cursor = personal_coll.find(doc! { "user": &uid }).await?;
    let mut personal_tasks = Vec::new();
    while let Some(task) = cursor.next().await {
        personal_tasks.push(task?);
    }

    let team_coll = data.mongodb.db.collection::<TeamTask>("team_tasks");
    let mut cursor = team_coll.find(doc! { "createdBy": &uid }).await?;
    let mut team_tasks = Vec::new();
    while let Some(task) = cursor.next().await {
        team_tasks.push(task?);
    }

    Ok(HttpResponse::Ok().json(json!({
        "personalTasks": personal_tasks,
        "teamTasks": team_tasks,
        "status": true,
        "msg": "Tasks found successfully.."
    })))
}

// GET /tasks/find?taskId=
// Looks a team task up by its human code; any authenticated caller.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindTeamTaskQuery {
    pub task_id: Option<String>,
}

pub async fn find_team_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<FindTeamTaskQuery>,
) -> Result<HttpResponse, ApiError> {
    // Any authenticated caller may look a task up by its code.
    current_user_id(&req)?;
    let code = query
        .task_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("Task ID is required".to_string()))?;

    let team_coll = data.mongodb.db.collection::<TeamTask>("team_tasks");
    let task = team_coll
        .find_one(doc! { "taskId": code.to_uppercase() })
        .await?
        .ok_or_else(|| ApiError::NotFound("Team task not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "task": task,
        "status": true,
        "msg": "Team task found successfully"
    })))
}

// GET /tasks/{taskId}
pub async fn get_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user_id(&req)?;
    let task_id = task_id.into_inner();

    let personal_coll = data.mongodb.db.collection::<PersonalTask>("tasks");
    if let Some(task) = personal_coll
        .find_one(doc! { "id": &task_id, "user": &uid })
        .await?
    {
        return Ok(HttpResponse::Ok().json(json!({
            "task": task,
            "status": true,
            "msg": "Task found successfully.."
        })));
    }

    let team_coll = data.mongodb.db.collection::<TeamTask>("team_tasks");
    let filter = doc! {
        "$or": [ { "id": &task_id }, { "taskId": task_id.to_uppercase() } ],
        "createdBy": &uid,
    };
    let task = team_coll
        .find_one(filter)
        .await?
        .ok_or_else(|| ApiError::NotFound("No task found..".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "task": task,
        "status": true,
        "msg": "Task found successfully.."
    })))
}

// POST /tasks
pub async fn post_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user_id(&req)?;
    debug!("post_task payload: {}", body.0);

    match parse_create_request(&body)? {
        CreateTaskRequest::Personal(info) => {
            if info.title.trim().is_empty()
                || info.end_date.trim().is_empty()
                || info.end_time.trim().is_empty()
            {
                return Err(ApiError::Validation(
                    "Title, end date, and end time are required".to_string(),
                ));
            }

            let now = Utc::now();
            let task = PersonalTask {
                id: Uuid::new_v4().to_string(),
                user: uid,
                title: info.title.trim().to_string(),
                end_date: info.end_date,
                end_time: info.end_time,
                is_completed: false,
                created_at: now,
                updated_at: now,
            };
            let personal_coll = data.mongodb.db.collection::<PersonalTask>("tasks");
            personal_coll.insert_one(&task).await?;

            Ok(HttpResponse::Ok().json(json!({
                "task": task,
                "status": true,
                "msg": "Task created successfully.."
            })))
        }
        CreateTaskRequest::Team(info) => {
            if info.task_id.trim().is_empty()
                || info.title.trim().is_empty()
                || info.description.trim().is_empty()
                || info.start_date.trim().is_empty()
                || info.end_date.trim().is_empty()
                || info.time.trim().is_empty()
            {
                return Err(ApiError::Validation(
                    "Task ID, title, description, startDate, endDate, time, and members \
                     are required for team task"
                        .to_string(),
                ));
            }

            let code = info.task_id.trim().to_uppercase();
            let team_coll = data.mongodb.db.collection::<TeamTask>("team_tasks");
            if team_coll
                .find_one(doc! { "taskId": &code })
                .await?
                .is_some()
            {
                return Err(ApiError::Conflict("Task ID already exists".to_string()));
            }

            // Every member starts at 0/0 regardless of what the caller sent.
            let members: Vec<Member> = info.members.iter().map(|m| Member::new(&m.name)).collect();
            validate_roster(&members)?;

            let now = Utc::now();
            let team_task = TeamTask {
                id: Uuid::new_v4().to_string(),
                task_id: code,
                title: info.title.trim().to_string(),
                description: info.description.trim().to_string(),
                start_date: info.start_date,
                end_date: info.end_date,
                time: info.time,
                progress: recompute_progress(&members),
                members,
                is_completed: false,
                created_by: uid,
                created_at: now,
                updated_at: now,
            };
            team_coll.insert_one(&team_task).await?;
            info!("Team task {} created", team_task.task_id);

            Ok(HttpResponse::Ok().json(json!({
                "teamTask": team_task,
                "status": true,
                "msg": "Team task created successfully with progress starting at 0."
            })))
        }
    }
}

// PUT /tasks/{taskId}
// Team tasks resolve by human code or id and go through the update
// authorizer; personal tasks are owner-only full replacements.
pub async fn put_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user_id(&req)?;
    let task_id = task_id.into_inner();

    let empty = body.0.as_object().map(|o| o.is_empty()).unwrap_or(true);
    if empty {
        return Err(ApiError::Validation(
            "Request body cannot be empty".to_string(),
        ));
    }

    let team_coll = data.mongodb.db.collection::<TeamTask>("team_tasks");
    let team_filter = doc! {
        "$or": [ { "id": &task_id }, { "taskId": task_id.to_uppercase() } ]
    };
    if let Some(stored) = team_coll.find_one(team_filter).await? {
        let patch = TeamTaskPatch::from_body(&body)?;
        let actor = find_user(&data.mongodb.db, &uid).await?;
        authorize_update(&stored, &patch, &actor.id, &actor.name)?;
        let updated = apply_update(&stored, patch, &actor.name, Utc::now())?;

        team_coll
            .replace_one(doc! { "id": &stored.id }, &updated)
            .await?;
        info!("Team task {} updated by {}", updated.task_id, actor.id);

        return Ok(HttpResponse::Ok().json(json!({
            "task": updated,
            "status": true,
            "msg": "Team task updated successfully"
        })));
    }

    let personal_coll = data.mongodb.db.collection::<PersonalTask>("tasks");
    let stored = personal_coll
        .find_one(doc! { "id": &task_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    if stored.user != uid {
        return Err(ApiError::Permission(
            "Only the owner can update this task".to_string(),
        ));
    }

    let title = body.get("title").and_then(Value::as_str);
    let end_date = body.get("endDate").and_then(Value::as_str);
    let end_time = body.get("endTime").and_then(Value::as_str);
    let (title, end_date, end_time) = match (title, end_date, end_time) {
        (Some(t), Some(d), Some(tm)) => (t, d, tm),
        _ => {
            return Err(ApiError::Validation(
                "Title, end date, and end time are required for simple task update".to_string(),
            ))
        }
    };

    let updated = PersonalTask {
        id: stored.id.clone(),
        user: stored.user.clone(),
        title: title.trim().to_string(),
        end_date: end_date.to_string(),
        end_time: end_time.to_string(),
        is_completed: body
            .get("isCompleted")
            .and_then(Value::as_bool)
            .unwrap_or(stored.is_completed),
        created_at: stored.created_at,
        updated_at: Utc::now(),
    };
    personal_coll
        .replace_one(doc! { "id": &stored.id }, &updated)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "task": updated,
        "status": true,
        "msg": "Task updated successfully"
    })))
}

// DELETE /tasks/{taskId}
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user_id(&req)?;
    let task_id = task_id.into_inner();

    let personal_coll = data.mongodb.db.collection::<PersonalTask>("tasks");
    let result = personal_coll
        .delete_one(doc! { "id": &task_id, "user": &uid })
        .await?;
    if result.deleted_count == 1 {
        return Ok(HttpResponse::Ok().json(json!({
            "status": true,
            "msg": "Personal task deleted successfully."
        })));
    }

    let team_coll = data.mongodb.db.collection::<TeamTask>("team_tasks");
    let filter = doc! {
        "$or": [ { "id": &task_id }, { "taskId": task_id.to_uppercase() } ],
        "createdBy": &uid,
    };
    let result = team_coll.delete_one(filter).await?;
    if result.deleted_count == 1 {
        return Ok(HttpResponse::Ok().json(json!({
            "status": true,
            "msg": "Team task deleted successfully."
        })));
    }

    Err(ApiError::NotFound(
        "Task not found or you dont have permission".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_field_body_creates_a_personal_task() {
        let body = json!({
            "title": "Buy milk",
            "endDate": "2025-12-01",
            "endTime": "18:00"
        });
        match parse_create_request(&body).unwrap() {
            CreateTaskRequest::Personal(info) => {
                assert_eq!(info.title, "Buy milk");
                assert_eq!(info.end_date, "2025-12-01");
            }
            other => panic!("expected personal task, got {:?}", other),
        }
    }

    #[test]
    fn full_team_body_creates_a_team_task() {
        let body = json!({
            "taskId": "abc123",
            "title": "Ship release",
            "description": "Cut and ship 2.0",
            "startDate": "2025-12-01",
            "endDate": "2025-12-15",
            "time": "17:00",
            "members": [ { "name": "Alice" }, { "name": "Bob" } ]
        });
        match parse_create_request(&body).unwrap() {
            CreateTaskRequest::Team(info) => {
                assert_eq!(info.members.len(), 2);
                assert_eq!(info.task_id, "abc123");
            }
            other => panic!("expected team task, got {:?}", other),
        }
    }

    #[test]
    fn caller_supplied_member_progress_is_discarded_on_create() {
        let body = json!({
            "taskId": "abc123",
            "title": "Ship release",
            "description": "Cut and ship 2.0",
            "startDate": "2025-12-01",
            "endDate": "2025-12-15",
            "time": "17:00",
            "members": [ { "name": "Alice", "totalProgress": 80, "currentProgress": 30 } ]
        });
        let CreateTaskRequest::Team(info) = parse_create_request(&body).unwrap() else {
            panic!("expected team task");
        };
        let members: Vec<Member> = info.members.iter().map(|m| Member::new(&m.name)).collect();
        assert_eq!(members[0].total_progress, 0);
        assert_eq!(members[0].current_progress, 0);
        assert_eq!(recompute_progress(&members), 0);
    }

    #[test]
    fn unrecognized_shape_is_rejected() {
        let body = json!({ "foo": "bar" });
        assert!(matches!(
            parse_create_request(&body),
            Err(ApiError::Validation(_))
        ));
    }
}

// src/chat.rs
//
// Task-aware chat assistant: renders the caller's tasks into a fixed prompt
// and forwards it to the Generative Language API. No retries, no caching;
// a downstream failure surfaces as a service error.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::NaiveDate;
use futures_util::StreamExt;
use log::{debug, error};
use mongodb::bson::doc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::app_state::AppState;
use crate::auth::{current_user_id, find_user};
use crate::errors::ApiError;
use crate::models::{PersonalTask, TeamTask};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Renders a stored calendar date ("2025-12-01") the way JS `toDateString`
/// does ("Mon Dec 01 2025"); anything unparseable becomes "No date".
fn human_date(date: &str) -> String {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map(|d| d.format("%a %b %d %Y").to_string())
        .unwrap_or_else(|_| "No date".to_string())
}

fn status_label(is_completed: bool) -> &'static str {
    if is_completed {
        "Completed"
    } else {
        "Pending"
    }
}

pub fn format_personal_context(tasks: &[PersonalTask]) -> String {
    if tasks.is_empty() {
        return "No personal tasks.".to_string();
    }
    tasks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let label = if t.title.trim().is_empty() {
                "Untitled task"
            } else {
                t.title.as_str()
            };
            format!(
                "{}. [Personal] {} (Due: {}, Status: {})",
                i + 1,
                label,
                human_date(&t.end_date),
                status_label(t.is_completed)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_team_context(tasks: &[TeamTask]) -> String {
    if tasks.is_empty() {
        return "No team tasks.".to_string();
    }
    tasks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let title = if t.title.trim().is_empty() {
                "Untitled Team Task"
            } else {
                t.title.as_str()
            };
            format!(
                "{}. [Team] {} (Due: {}, Status: {})",
                i + 1,
                title,
                human_date(&t.end_date),
                status_label(t.is_completed)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The full prompt handed to the model. The instructions pin the model to
/// the two lists above it.
pub fn build_prompt(user_name: &str, personal_context: &str, team_context: &str, message: &str) -> String {
    format!(
        "You are a helpful Task Manager Assistant for {user_name}.\n\
         \n\
         Here is the user's REAL-TIME task list:\n\
         \n\
         === PERSONAL TASKS ===\n\
         {personal_context}\n\
         \n\
         === TEAM TASKS ===\n\
         {team_context}\n\
         \n\
         --------------------\n\
         User's Question: \"{message}\"\n\
         \n\
         Instructions:\n\
         - Answer based strictly on the tasks listed above.\n\
         - If the user asks \"What are my tasks?\", list both Personal and Team tasks.\n\
         - If the list is empty, say \"You have no tasks found.\"\n"
    )
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

async fn generate_reply(data: &AppState, prompt: &str) -> Result<String, ApiError> {
    let url = format!(
        "{}/models/{}:generateContent?key={}",
        data.config.gemini_endpoint.trim_end_matches('/'),
        data.config.gemini_model,
        data.config.gemini_api_key
    );
    let body = json!({
        "contents": [ { "parts": [ { "text": prompt } ] } ]
    });

    let resp = data
        .http_client
        .post(&url)
        .timeout(Duration::from_secs(data.config.chat_timeout_secs))
        .json(&body)
        .send()
        .await?;

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ApiError::Unavailable(
            "AI assistant is temporarily unavailable. Please try again later.".to_string(),
        ));
    }
    if status == StatusCode::NOT_FOUND {
        error!("Generative model {} not available", data.config.gemini_model);
        return Err(ApiError::Service(
            "Configured AI model is not available".to_string(),
        ));
    }
    if !status.is_success() {
        error!("Generative API error: {}", status);
        return Err(ApiError::Service("Internal Server Error".to_string()));
    }

    let parsed: GenerateContentResponse = resp.json().await?;
    parsed
        .candidates
        .and_then(|mut c| c.drain(..).next())
        .and_then(|c| c.content.parts)
        .and_then(|mut p| p.drain(..).next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            error!("Generative API returned no text candidate");
            ApiError::Service("Internal Server Error".to_string())
        })
}

// POST /chat
pub async fn handle_chat(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let uid = current_user_id(&req)?;
    debug!("chat request from {}: {}", uid, payload.message);

    // The display name is needed to match the caller against team rosters.
    let user = find_user(&data.mongodb.db, &uid).await?;

    let personal_coll = data.mongodb.db.collection::<PersonalTask>("tasks");
    let mut cursor = personal_coll.find(doc! { "user": &uid }).await?;
    let mut personal_tasks = Vec::new();
    while let Some(task) = cursor.next().await {
        personal_tasks.push(task?);
    }

    // Tasks the caller created, or appears in as a named member.
    let team_coll = data.mongodb.db.collection::<TeamTask>("team_tasks");
    let filter = doc! {
        "$or": [
            { "createdBy": &uid },
            { "members.name": &user.name },
        ]
    };
    let mut cursor = team_coll.find(filter).await?;
    let mut team_tasks = Vec::new();
    while let Some(task) = cursor.next().await {
        team_tasks.push(task?);
    }

    let prompt = build_prompt(
        &user.name,
        &format_personal_context(&personal_tasks),
        &format_team_context(&team_tasks),
        &payload.message,
    );

    let reply = generate_reply(&data, &prompt).await?;
    Ok(HttpResponse::Ok().json(json!({ "reply": reply })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn personal(title: &str, end_date: &str, done: bool) -> PersonalTask {
        PersonalTask {
            id: "p-1".to_string(),
            user: "u-1".to_string(),
            title: title.to_string(),
            end_date: end_date.to_string(),
            end_time: "18:00".to_string(),
            is_completed: done,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn team(title: &str, end_date: &str, done: bool) -> TeamTask {
        TeamTask {
            id: "t-1".to_string(),
            task_id: "ABC123".to_string(),
            title: title.to_string(),
            description: "desc".to_string(),
            start_date: "2025-12-01".to_string(),
            end_date: end_date.to_string(),
            time: "17:00".to_string(),
            members: vec![],
            progress: 0,
            is_completed: done,
            created_by: "u-1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn human_date_matches_to_date_string() {
        assert_eq!(human_date("2025-12-01"), "Mon Dec 01 2025");
        assert_eq!(human_date(""), "No date");
        assert_eq!(human_date("next tuesday"), "No date");
    }

    #[test]
    fn personal_context_lines_are_numbered() {
        let tasks = vec![
            personal("Buy milk", "2025-12-01", false),
            personal("File taxes", "bad-date", true),
        ];
        let ctx = format_personal_context(&tasks);
        assert_eq!(
            ctx,
            "1. [Personal] Buy milk (Due: Mon Dec 01 2025, Status: Pending)\n\
             2. [Personal] File taxes (Due: No date, Status: Completed)"
        );
    }

    #[test]
    fn team_context_falls_back_to_untitled() {
        let tasks = vec![team("", "2025-12-15", false)];
        let ctx = format_team_context(&tasks);
        assert_eq!(
            ctx,
            "1. [Team] Untitled Team Task (Due: Mon Dec 15 2025, Status: Pending)"
        );
    }

    #[test]
    fn empty_lists_use_fixed_lines() {
        assert_eq!(format_personal_context(&[]), "No personal tasks.");
        assert_eq!(format_team_context(&[]), "No team tasks.");
    }

    #[test]
    fn prompt_embeds_both_sections_and_the_question() {
        let prompt = build_prompt("Alice", "No personal tasks.", "No team tasks.", "What's due?");
        assert!(prompt.contains("Task Manager Assistant for Alice"));
        assert!(prompt.contains("=== PERSONAL TASKS ===\nNo personal tasks."));
        assert!(prompt.contains("=== TEAM TASKS ===\nNo team tasks."));
        assert!(prompt.contains("User's Question: \"What's due?\""));
        assert!(prompt.contains("say \"You have no tasks found.\""));
    }
}

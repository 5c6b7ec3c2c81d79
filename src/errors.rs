// src/errors.rs

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use thiserror::Error;

/// Crate-wide error type. Every variant maps to the `{status: false, msg}`
/// response envelope the API uses for failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// Authorization rule violated by an otherwise valid request.
    #[error("{0}")]
    Permission(String),

    /// No matching record.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate email, phone or team-task code.
    #[error("{0}")]
    Conflict(String),

    /// Database or downstream service failure.
    #[error("{0}")]
    Service(String),

    /// Downstream service temporarily unavailable (timeout, quota).
    #[error("{0}")]
    Unavailable(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Permission(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            // The original API reported duplicates as plain 400s.
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(json!({ "status": false, "msg": self.to_string() }))
    }
}

impl From<mongodb::error::Error> for ApiError {
    fn from(err: mongodb::error::Error) -> Self {
        error!("Database error: {}", err);
        ApiError::Service("Internal Server Error".to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        error!("Outbound request error: {}", err);
        if err.is_timeout() || err.is_connect() {
            ApiError::Unavailable("AI assistant is temporarily unavailable".to_string())
        } else {
            ApiError::Service("Internal Server Error".to_string())
        }
    }
}

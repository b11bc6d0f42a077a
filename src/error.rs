use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Already enrolled in this course")]
    AlreadyEnrolled,

    #[error("Not enrolled in this course")]
    NotEnrolled,

    #[error("Course is full")]
    CourseFull,

    #[error("Course is closed")]
    CourseClosed,

    #[error("Schedule conflict with {course_name}")]
    ScheduleConflict {
        course_id: String,
        course_name: String,
    },

    // A breached ledger guarantee, not a user mistake. Callers must not
    // retry; the admission path has a bug if this ever fires.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl AppError {
    /// Stable machine-readable code, one per failure signal, so the
    /// presentation layer can distinguish them without parsing messages.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::NotFound => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::AlreadyEnrolled => "already_enrolled",
            AppError::NotEnrolled => "not_enrolled",
            AppError::CourseFull => "course_full",
            AppError::CourseClosed => "course_closed",
            AppError::ScheduleConflict { .. } => "schedule_conflict",
            AppError::InvariantViolation(_) => "invariant_violation",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_course_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let mut conflicting_course_id = None;

        let (status, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AlreadyEnrolled
            | AppError::NotEnrolled
            | AppError::CourseFull
            | AppError::CourseClosed => (StatusCode::CONFLICT, self.to_string()),
            AppError::ScheduleConflict {
                ref course_id,
                ref course_name,
            } => {
                conflicting_course_id = Some(course_id.clone());
                (
                    StatusCode::CONFLICT,
                    format!("Schedule conflict with {course_name}"),
                )
            }
            AppError::Database(ref e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::InvariantViolation(ref msg) => {
                error!("invariant violation: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal consistency error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message,
            conflicting_course_id,
        });

        (status, body).into_response()
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::models::interview::{InterviewEvent, InterviewStatus};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot {event} an interview that is {current}")]
    InvalidStateTransition {
        current: InterviewStatus,
        event: InterviewEvent,
        allowed: Vec<InterviewEvent>,
        detail: Option<String>,
    },

    #[error("A reschedule request is already outstanding for this interview")]
    ConflictingRequest,

    #[error("The requested slot is no longer available")]
    SlotNoLongerAvailable,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error: {0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_transition(
        current: InterviewStatus,
        event: InterviewEvent,
        allowed: Vec<InterviewEvent>,
    ) -> Self {
        Error::InvalidStateTransition {
            current,
            event,
            allowed,
            detail: None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Error::ConflictingRequest => "CONFLICTING_REQUEST",
            Error::SlotNoLongerAvailable => "SLOT_NO_LONGER_AVAILABLE",
            Error::Conflict(_) => "CONFLICT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Validation(_) | Error::ValidationErrors(_) | Error::Json(_) => {
                "VALIDATION_ERROR"
            }
            Error::UpstreamUnavailable(_) | Error::Reqwest(_) => "UPSTREAM_UNAVAILABLE",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::Forbidden(_) => "FORBIDDEN",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let code = self.code();
        let message = self.to_string();
        let (status, body) = match self {
            Error::InvalidStateTransition {
                current,
                event,
                allowed,
                detail,
            } => {
                let message = match &detail {
                    Some(d) => format!("Cannot {} an interview that is {}: {}", event, current, d),
                    None => format!("Cannot {} an interview that is {}", event, current),
                };
                (
                    StatusCode::CONFLICT,
                    json!({
                        "error": message,
                        "code": code,
                        "current_status": current,
                        "event": event,
                        "allowed_events": allowed,
                    }),
                )
            }
            Error::ConflictingRequest | Error::SlotNoLongerAvailable | Error::Conflict(_) => {
                (StatusCode::CONFLICT, json!({ "error": message, "code": code }))
            }
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg, "code": code })),
            Error::Validation(msg) => {
                (StatusCode::BAD_REQUEST, json!({ "error": msg, "code": code }))
            }
            Error::ValidationErrors(err) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": err.to_string(), "code": code }),
            ),
            Error::Json(err) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": err.to_string(), "code": code }),
            ),
            Error::UpstreamUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": msg, "code": code }),
            ),
            Error::Reqwest(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": format!("External service error: {}", err), "code": code }),
            ),
            Error::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": msg, "code": code }))
            }
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg, "code": code })),
            Error::Database(err) => {
                tracing::error!(error = ?err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error occurred", "code": code }),
                )
            }
            Error::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": msg, "code": code }),
                )
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "An unexpected error occurred", "code": code }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(ref db_err) => {
                let sqlstate = db_err.code().map(|c| c.into_owned());
                // 23P01 exclusion_violation, 23505 unique_violation
                match sqlstate.as_deref() {
                    Some("23P01") => Error::Conflict(
                        "Interviewer already has an interview in this window".to_string(),
                    ),
                    Some("23505") => Error::Conflict("Resource already exists".to_string()),
                    _ => Error::Database(err),
                }
            }
            other => Error::Database(other),
        }
    }
}

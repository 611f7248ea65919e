use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::TaskStatus;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event {0} not found")]
    NotFound(Uuid),

    #[error("Task {0} not found")]
    TaskNotFound(Uuid),

    #[error("Interest {interest_id} is not associated with event {event_id}")]
    InterestNotFound { event_id: Uuid, interest_id: Uuid },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("end_time must be after start_time")]
    InvalidWindow,

    #[error("Event {0} has been modified")]
    EtagMismatch(Uuid),

    #[error("If-Match header is required")]
    PreconditionRequired,

    #[error("Invalid task transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EventResult<T> = Result<T, EventError>;

impl From<validator::ValidationErrors> for EventError {
    fn from(err: validator::ValidationErrors) -> Self {
        EventError::Validation(err.to_string())
    }
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::NotFound(_)
            | EventError::TaskNotFound(_)
            | EventError::InterestNotFound { .. } => AppError::NotFound(err.to_string()),
            EventError::Validation(msg) => AppError::BadRequest(msg),
            EventError::InvalidWindow => AppError::BadRequest(err.to_string()),
            EventError::EtagMismatch(_) => AppError::Conflict(err.to_string()),
            EventError::PreconditionRequired => AppError::PreconditionFailed(err.to_string()),
            EventError::Database(e) => AppError::Database(e),
            EventError::Serialization(e) => AppError::SerdeJson(e),
            EventError::InvalidTransition { .. }
            | EventError::Publish(_)
            | EventError::Internal(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl IntoResponse for EventError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

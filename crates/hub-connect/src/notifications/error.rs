use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::domain::NotificationStatus;
use super::repository::RepositoryError;

/// Caller-visible failures of the delivery pipeline.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("missing tenant credential")]
    Unauthorized,
    #[error("credential rejected or tenant not active")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("notification is {}, expected {}", .actual.label(), .expected.label())]
    InvalidState {
        expected: NotificationStatus,
        actual: NotificationStatus,
    },
    #[error("retry limit of {limit} attempts reached")]
    RetryLimitExceeded { limit: u32 },
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// Gateway or workflow-engine outage. Dispatch records gateway failures
    /// on the notification and forwards are only logged, so no pipeline
    /// operation returns this today.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for NotifyError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(field) => NotifyError::Conflict(field),
            RepositoryError::StatusMismatch { expected, actual } => {
                NotifyError::InvalidState { expected, actual }
            }
            RepositoryError::RetryLimitReached { limit } => NotifyError::RetryLimitExceeded { limit },
            other => NotifyError::Repository(other),
        }
    }
}

impl NotifyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            NotifyError::Unauthorized => StatusCode::UNAUTHORIZED,
            NotifyError::Forbidden => StatusCode::FORBIDDEN,
            NotifyError::NotFound(_) => StatusCode::NOT_FOUND,
            NotifyError::InvalidArgument(_)
            | NotifyError::InvalidState { .. }
            | NotifyError::RetryLimitExceeded { .. } => StatusCode::BAD_REQUEST,
            NotifyError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            NotifyError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            NotifyError::Conflict(_) => StatusCode::CONFLICT,
            NotifyError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            NotifyError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NotifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

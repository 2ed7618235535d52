use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or unusable user input; the run does not start.
    #[error("{0}")]
    Validation(String),
    /// An external capability failed; the run halts at its current phase.
    #[error("{0}")]
    Collaborator(String),
    #[error("{0}")]
    Internal(String),
    #[error("session not found")]
    NotFound,
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Collaborator(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Workflow(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("❌ {}", self);
        } else {
            tracing::info!("⚠️ Request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Collaborator("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::from(WorkflowError::Stale).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn messages_are_passed_through_verbatim() {
        let err = AppError::Validation("Vui lòng nhập nội dung.".into());
        assert_eq!(err.to_string(), "Vui lòng nhập nội dung.");
    }
}

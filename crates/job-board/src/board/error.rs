use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use super::repository::RepositoryError;

/// Error raised by the board services and rendered by the router.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repository(RepositoryError),
    #[error("credential error: {0}")]
    Credential(String),
}

impl BoardError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BoardError::Validation(_) => StatusCode::BAD_REQUEST,
            BoardError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            BoardError::Forbidden(_) => StatusCode::FORBIDDEN,
            BoardError::NotFound(_) => StatusCode::NOT_FOUND,
            BoardError::Conflict(_) => StatusCode::CONFLICT,
            BoardError::Repository(_) | BoardError::Credential(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<RepositoryError> for BoardError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => Self::Conflict("Record already exists".to_string()),
            RepositoryError::NotFound => Self::NotFound("Record not found".to_string()),
            RepositoryError::Stale => {
                Self::Conflict("Record was changed by another request".to_string())
            }
            other => Self::Repository(other),
        }
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_map_onto_client_statuses() {
        assert_eq!(
            BoardError::from(RepositoryError::Conflict).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BoardError::from(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BoardError::from(RepositoryError::Stale).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BoardError::from(RepositoryError::Unavailable("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_hide_details() {
        let response =
            BoardError::Repository(RepositoryError::Unavailable("db on fire".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

//! API error type and response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use skein_execution::ExecutionError;
use skein_storage::StorageError;
use thiserror::Error;

/// Errors surfaced to API clients. Messages are human-readable; internal
/// detail stays in the logs.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid token.
    #[error("authentication required")]
    Unauthorized,

    /// Authenticated but not allowed.
    #[error("access denied")]
    Forbidden,

    /// The resource does not exist (or is not visible to the caller).
    #[error("not found")]
    NotFound,

    /// The request is malformed or the transition illegal.
    #[error("{0}")]
    BadRequest(String),

    /// Rate or concurrency limit hit.
    #[error("{0}")]
    TooManyRequests(String),

    /// Unique-constraint conflict.
    #[error("{0}")]
    Conflict(String),

    /// Anything unexpected; detail is logged, not returned.
    #[error("internal error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            StorageError::Conflict(message) => Self::Conflict(message),
            other => {
                tracing::error!("storage error: {other}");
                Self::Internal
            }
        }
    }
}

impl From<skein_credential::CredentialError> for ApiError {
    fn from(err: skein_credential::CredentialError) -> Self {
        match err {
            skein_credential::CredentialError::NotFound => Self::NotFound,
            skein_credential::CredentialError::Storage(storage) => storage.into(),
            other => {
                tracing::error!("credential error: {other}");
                Self::Internal
            }
        }
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::NotFound => Self::NotFound,
            ExecutionError::AccessDenied => Self::Forbidden,
            ExecutionError::InvalidTransition { from, to } => {
                Self::BadRequest(format!("illegal transition from {from} to {to}"))
            }
            other => {
                tracing::error!("execution error: {other}");
                Self::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::TooManyRequests("x".into()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn storage_not_found_maps_to_404() {
        let err: ApiError = StorageError::NotFound.into();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn illegal_transition_maps_to_400() {
        let err: ApiError = ExecutionError::InvalidTransition {
            from: "completed".into(),
            to: "paused".into(),
        }
        .into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}

//! Request-level error taxonomy for the gateway.
//!
//! Every handler returns `Result<_, AppError>`; the `IntoResponse` impl
//! maps each variant to its HTTP status and a `{"error": ...}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::nlu::resolver::NluError;

/// Application-level error that converts into an HTTP response.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad, missing, or expired credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Empty message or out-of-range query parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An NLU engine was unreachable or returned a malformed payload.
    #[error("dependency failure: {0}")]
    DependencyFailure(String),

    /// Storage error on a read/write endpoint.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::DependencyFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<NluError> for AppError {
    fn from(err: NluError) -> Self {
        AppError::DependencyFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Unauthorized("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidArgument("empty message".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::DependencyFailure("dialogflow down".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

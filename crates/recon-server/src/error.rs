//! Error handling for the HTTP API
//!
//! Failures that happen before a job's output starts streaming are turned
//! into one-shot JSON responses of the form `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use recon_executor::ProcessError;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::validation::ValidationError;

/// Result type alias for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Body of every JSON error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Launch(#[from] ProcessError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Launch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error type for logging
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(ValidationError::MissingFields) => "missing_fields",
            ApiError::Validation(_) => "invalid_argument",
            ApiError::Launch(_) => "launch_failure",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        match &self {
            ApiError::Validation(e) => warn!(error_type, details = %e, "Rejected job request"),
            ApiError::Launch(e) => error!(error_type, details = %e, "Failed to start job"),
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let error = ApiError::from(ValidationError::MissingFields);

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.error_type(), "missing_fields");
        assert_eq!(error.to_string(), "Domain and task are required!");
    }

    #[test]
    fn test_launch_maps_to_internal_error() {
        let error = ApiError::from(ProcessError::Launch {
            command: "./recon_ubuntu.sh".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });

        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.error_type(), "launch_failure");
        assert!(error.to_string().contains("./recon_ubuntu.sh"));
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::from(ValidationError::MissingFields).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"error": "Domain and task are required!"})
        );
    }
}

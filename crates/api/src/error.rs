//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::services::ServiceError;

/// API-level error type that maps to the `{error, message}` envelope.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest {
        code: &'static str,
        message: String,
    },
    /// Resource not found.
    NotFound {
        code: &'static str,
        message: String,
    },
    /// A downstream service failed at the transport level.
    ServiceFailure(ServiceError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            ApiError::ServiceFailure(err) => {
                (StatusCode::BAD_GATEWAY, "service_error", err.to_string())
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };

        let body = serde_json::json!({ "error": code, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::OrderNotFound(_) => ApiError::NotFound {
                code: "order_not_found",
                message: err.to_string(),
            },
            ServiceError::Unavailable(_) => ApiError::ServiceFailure(err),
        }
    }
}

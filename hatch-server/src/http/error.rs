//! API error type with IntoResponse
//!
//! The one place domain errors become HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::models::ValidationError;
use crate::services::ServiceError;

#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Path exists but not for this method (405)
    MethodNotAllowed,

    /// Uniqueness violation (409)
    Conflict { message: String },

    /// Store unreachable (500 outside the health endpoints)
    Unavailable { message: String },

    /// Internal error (500, logged)
    Internal { message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "message": e.to_string(),
                    "fields": e.field_errors(),
                }),
            ),
            Self::NotFound { resource, .. } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} not found", resource)
                }),
            ),
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({
                    "error": "method_not_allowed",
                    "message": "method not allowed"
                }),
            ),
            Self::Conflict { message } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "conflict",
                    "message": message
                }),
            ),
            Self::Unavailable { message } => {
                tracing::error!("Store unavailable: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "unavailable",
                        "message": "service temporarily unavailable"
                    }),
                )
            }
            Self::Internal { message } => {
                // Log the actual error, return generic message
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(e) => Self::Validation(e),
            ServiceError::NotFound { resource, id } => Self::NotFound { resource, id },
            ServiceError::Conflict { message } => Self::Conflict { message },
            ServiceError::Unavailable { message } => Self::Unavailable { message },
            ServiceError::Store(e) => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400_with_fields() {
        let err = ApiError::Validation(ValidationError::Multiple(vec![
            ValidationError::Empty { field: "email" },
            ValidationError::TooLong { field: "name", max: 255 },
        ]));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["fields"][0]["field"], "email");
        assert_eq!(body["fields"][1]["field"], "name");
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let response = ApiError::from(ServiceError::not_found("User", 3)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await["message"], "User not found");
    }

    #[tokio::test]
    async fn conflict_is_409() {
        let response = ApiError::from(ServiceError::conflict("taken")).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body(response).await["error"], "conflict");
    }

    #[tokio::test]
    async fn unavailable_hides_the_cause() {
        let err = ServiceError::Unavailable {
            message: "password authentication failed".into(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body(response).await;
        assert_eq!(body["error"], "unavailable");
        assert!(!body["message"].as_str().unwrap().contains("password"));
    }
}

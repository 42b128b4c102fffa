//! HTTP error mapping.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use plinth_models::ModelError;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
///
/// Serialized as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl ApiError {
    /// Required keys were absent from the request body.
    pub fn missing_fields() -> Self {
        Self::BadRequest("Missing required fields".to_string())
    }

    /// A PUT request carried no updatable payload.
    pub fn no_data() -> Self {
        Self::BadRequest("No data provided".to_string())
    }

    /// Generic 500; the cause must already be logged.
    pub fn internal() -> Self {
        Self::InternalServerError("Internal server error".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            ModelError::Duplicate(msg)
            | ModelError::InvalidReference(msg)
            | ModelError::Validation(msg) => ApiError::BadRequest(msg),
            ref err @ (ModelError::Database(_) | ModelError::PasswordHash(_)) => {
                tracing::error!(error = %err, "model operation failed");
                ApiError::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::BadRequest("Request body must be JSON".to_string())
            }
            other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                ApiError::PayloadTooLarge("Request body too large".to_string())
            }
            other => ApiError::BadRequest(format!("Invalid JSON body: {}", other.body_text())),
        }
    }
}

/// Parses a path id. Anything that is not an integer names no resource.
pub(crate) fn parse_id(raw: &str, entity: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("{entity} not found")))
}

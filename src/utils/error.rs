use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{error::InternalError, HttpRequest, HttpResponse};
use serde_json::Value;

use crate::models::ApiResponse;

/// Error taxonomy for the request/response path. Every variant maps to one
/// HTTP status and is rendered through the response envelope at the handler
/// boundary; nothing propagates unhandled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 400 - missing required fields, unknown assignee, duplicate email,
    /// malformed query parameter.
    InvalidRequest(String),
    /// 400 - field-level validation failure, with the failing constraint.
    Validation(String),
    /// 404 - identity does not resolve to a stored record.
    NotFound(String),
    /// 500 - datastore or driver failure.
    Database(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn database(err: impl fmt::Display) -> Self {
        ApiError::Database(err.to_string())
    }

    /// Render into the `{ message, data }` envelope.
    pub fn to_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::InvalidRequest(message) => ApiResponse::message_only(message.clone()),
            ApiError::Validation(detail) => {
                ApiResponse::new("Validation failed", Value::String(detail.clone()))
            }
            ApiError::NotFound(message) => ApiResponse::message_only(message.clone()),
            ApiError::Database(detail) => {
                ApiResponse::new("Server error", Value::String(detail.clone()))
            }
        };
        HttpResponse::build(self.status()).json(body)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::Validation(msg) => write!(f, "Validation failed: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Keeps malformed JSON bodies inside the envelope contract instead of
/// actix's default error body.
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &HttpRequest,
) -> actix_web::Error {
    let response = HttpResponse::BadRequest()
        .json(ApiResponse::message_only(format!("Invalid request body: {}", err)));
    InternalError::from_response(err, response).into()
}

/// Same for undeserializable query strings (e.g. non-numeric `skip`).
pub fn query_error_handler(
    err: actix_web::error::QueryPayloadError,
    _req: &HttpRequest,
) -> actix_web::Error {
    let response = HttpResponse::BadRequest()
        .json(ApiResponse::message_only(format!("Invalid query parameters: {}", err)));
    InternalError::from_response(err, response).into()
}

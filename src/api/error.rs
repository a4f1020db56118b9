//! API error handling.
//!
//! Every failure is rendered as `{"error": ...}` where the payload is either a
//! message string or, for failed validation, a map of field to message.

use std::collections::BTreeMap;
use std::fmt::Display;

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::json::{Envelope, JsonResponse};
use crate::domain::Validator;
use crate::infrastructure::RepositoryError;

/// Message for 404 responses.
pub const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";

/// Message for 409 responses.
pub const EDIT_CONFLICT_MESSAGE: &str =
    "unable to update the record due to an edit conflict, please try again";

/// Message for 408 responses.
pub const REQUEST_TIMEOUT_MESSAGE: &str = "the request took too long to process";

/// Message for 429 responses.
pub const RATE_LIMIT_MESSAGE: &str = "rate limit exceeded";

/// Message for 500 responses. The real cause is only logged.
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

// =============================================================================
// Error Body
// =============================================================================

/// Payload stored under the `error` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    /// A single human-readable message.
    Message(String),
    /// Field name to validation message.
    Fields(BTreeMap<String, String>),
}

// =============================================================================
// API Error Response
// =============================================================================

/// API error response containing status code and error details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Error details.
    pub error: ErrorBody,
}

impl ApiErrorResponse {
    /// Creates a response with a plain message.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ErrorBody::Message(message.into()),
        }
    }

    /// 400 Bad Request carrying the decode error message.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
    }

    /// 405 Method Not Allowed.
    #[must_use]
    pub fn method_not_allowed(method: &Method) -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("the {method} method is not supported for this resource"),
        )
    }

    /// 409 Conflict for optimistic locking failures.
    #[must_use]
    pub fn edit_conflict() -> Self {
        Self::new(StatusCode::CONFLICT, EDIT_CONFLICT_MESSAGE)
    }

    /// 422 Unprocessable Entity with per-field messages.
    #[must_use]
    pub fn failed_validation(validator: Validator) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error: ErrorBody::Fields(validator.into_errors()),
        }
    }

    /// 408 Request Timeout.
    #[must_use]
    pub fn request_timeout() -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT_MESSAGE)
    }

    /// 429 Too Many Requests.
    #[must_use]
    pub fn rate_limit_exceeded() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE)
    }

    /// 500 Internal Server Error. Logs `cause`; the client only sees a generic message.
    #[must_use]
    pub fn server_error(cause: impl Display) -> Self {
        tracing::error!(error = %cause, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        JsonResponse::new(self.status, Envelope::new("error", self.error)).into_response()
    }
}

impl From<RepositoryError> for ApiErrorResponse {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => Self::not_found(),
            RepositoryError::EditConflict => Self::edit_conflict(),
            RepositoryError::Timeout | RepositoryError::DatabaseError(_) => {
                Self::server_error(error)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

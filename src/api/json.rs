//! JSON request decoding and response encoding.
//!
//! Responses are pretty-printed, newline terminated and always wrapped in an
//! envelope object. Request bodies go through [`StrictJson`], which caps the
//! size, rejects unknown keys and trailing values, and turns decoder errors
//! into messages a client can act on.

use axum::{
    body::Body,
    extract::{FromRequest, Request},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Serialize, Serializer, de::DeserializeOwned, ser::SerializeMap};
use serde_json::error::Category;
use serde_path_to_error::{Path, Segment};
use thiserror::Error;

use super::error::ApiErrorResponse;

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 1_048_576;

// =============================================================================
// Envelope
// =============================================================================

/// Wraps a payload as `{"<key>": payload}`.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    key: &'static str,
    value: T,
}

impl<T> Envelope<T> {
    /// Creates an envelope with a single key.
    pub const fn new(key: &'static str, value: T) -> Self {
        Self { key, value }
    }

    /// Returns the wrapped payload.
    pub const fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key, &self.value)?;
        map.end()
    }
}

// =============================================================================
// JsonResponse
// =============================================================================

/// Serializes `body` as indented JSON followed by a newline.
///
/// # Errors
///
/// Returns the serializer error if `body` cannot be represented as JSON.
pub fn serialize_json_bytes<T: Serialize>(body: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec_pretty(body)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// JSON response with status code and extra headers.
///
/// # Example
///
/// ```ignore
/// JsonResponse::new(StatusCode::CREATED, Envelope::new("movie", movie))
///     .with_header(header::LOCATION, "/v1/movies/1")
/// ```
#[derive(Debug)]
pub struct JsonResponse<T> {
    status: StatusCode,
    headers: HeaderMap,
    body: T,
}

impl<T> JsonResponse<T> {
    /// Creates a response with the given status code and body.
    pub fn new(status: StatusCode, body: T) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Creates a 200 OK response.
    pub fn ok(body: T) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Adds a header. Values that are not valid header text are dropped.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Returns the status code.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the body.
    pub const fn body(&self) -> &T {
        &self.body
    }
}

impl<T: Serialize> IntoResponse for JsonResponse<T> {
    fn into_response(self) -> Response {
        match serialize_json_bytes(&self.body) {
            Ok(bytes) => {
                let mut headers = self.headers;
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                (self.status, headers, Body::from(bytes)).into_response()
            }
            Err(error) => ApiErrorResponse::server_error(error).into_response(),
        }
    }
}

// =============================================================================
// Request Decoding
// =============================================================================

/// Reasons a request body could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonBodyError {
    #[error("body must not be empty")]
    Empty,

    #[error("body must not be larger than {limit} bytes")]
    TooLarge { limit: usize },

    #[error("body contains badly-formed JSON (at character {offset})")]
    BadlyFormed { offset: usize },

    #[error("body contains badly-formed JSON")]
    UnexpectedEof,

    #[error("body contains incorrect JSON type for field \"{field}\"")]
    IncorrectFieldType { field: String },

    #[error("body contains incorrect JSON type (at character {offset})")]
    IncorrectType { offset: usize },

    #[error("body contains unknown key \"{0}\"")]
    UnknownKey(String),

    #[error("body must only contain a single JSON value")]
    TrailingData,

    /// A value was rejected by its own decoder, e.g. a malformed runtime.
    #[error("{0}")]
    Invalid(String),
}

/// Decodes exactly one JSON value of type `T` from `bytes`.
///
/// # Errors
///
/// Returns a [`JsonBodyError`] describing the first problem found.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, JsonBodyError> {
    if bytes.len() > MAX_BODY_BYTES {
        return Err(JsonBodyError::TooLarge {
            limit: MAX_BODY_BYTES,
        });
    }
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(JsonBodyError::Empty);
    }

    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|error| classify(&error, bytes))?;
    deserializer
        .end()
        .map_err(|_| JsonBodyError::TrailingData)?;
    Ok(value)
}

fn classify(
    error: &serde_path_to_error::Error<serde_json::Error>,
    bytes: &[u8],
) -> JsonBodyError {
    let inner = error.inner();
    let offset = byte_offset(bytes, inner.line(), inner.column());
    match inner.classify() {
        Category::Eof => JsonBodyError::UnexpectedEof,
        Category::Syntax | Category::Io => JsonBodyError::BadlyFormed { offset },
        Category::Data => {
            let message = strip_position(&inner.to_string());
            if let Some(key) = unknown_field(&message) {
                JsonBodyError::UnknownKey(key)
            } else if is_type_mismatch(&message) {
                field_name(error.path()).map_or(
                    JsonBodyError::IncorrectType { offset },
                    |field| JsonBodyError::IncorrectFieldType { field },
                )
            } else {
                JsonBodyError::Invalid(message)
            }
        }
    }
}

/// Dotted object keys leading to the failing value, ignoring array indexes.
fn field_name(path: &Path) -> Option<String> {
    let keys: Vec<&str> = path
        .iter()
        .filter_map(|segment| match segment {
            Segment::Map { key } => Some(key.as_str()),
            _ => None,
        })
        .collect();
    (!keys.is_empty()).then(|| keys.join("."))
}

/// Serde's wording for a value of the wrong JSON type or out of range.
fn is_type_mismatch(message: &str) -> bool {
    ["invalid type", "invalid value", "invalid length"]
        .iter()
        .any(|prefix| message.starts_with(prefix))
}

/// Converts serde's 1-based line/column into a byte offset into `bytes`.
fn byte_offset(bytes: &[u8], line: usize, column: usize) -> usize {
    let preceding: usize = bytes
        .split(|byte| *byte == b'\n')
        .take(line.saturating_sub(1))
        .map(|line| line.len() + 1)
        .sum();
    preceding + column
}

/// Drops serde's trailing ` at line L column C`.
fn strip_position(message: &str) -> String {
    message
        .rfind(" at line ")
        .map_or(message, |index| &message[..index])
        .to_string()
}

/// Extracts `name` from "unknown field `name`, expected ...".
fn unknown_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("unknown field `")?;
    rest.split_once('`').map(|(name, _)| name.to_string())
}

/// JSON body extractor with strict decoding rules.
///
/// Rejections are 400 responses carrying the [`JsonBodyError`] message.
#[derive(Debug, Clone)]
pub struct StrictJson<T>(pub T);

impl<S, T> FromRequest<S> for StrictJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiErrorResponse;

    async fn from_request(request: Request, _state: &S) -> Result<Self, Self::Rejection> {
        read_json(request.into_body()).await.map(Self)
    }
}

/// Buffers `body` up to [`MAX_BODY_BYTES`] and decodes it with [`decode_json`].
///
/// Handlers that must check other preconditions before looking at the body
/// take [`Body`] and call this themselves.
///
/// # Errors
///
/// Returns a 400 [`ApiErrorResponse`] carrying the [`JsonBodyError`] message.
pub async fn read_json<T: DeserializeOwned>(body: Body) -> Result<T, ApiErrorResponse> {
    // Buffering only fails once the limit is crossed or the client goes away.
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| {
            ApiErrorResponse::bad_request(
                JsonBodyError::TooLarge {
                    limit: MAX_BODY_BYTES,
                }
                .to_string(),
            )
        })?;

    decode_json(&bytes).map_err(|error| ApiErrorResponse::bad_request(error.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

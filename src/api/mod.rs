//! API module for HTTP handlers.
//!
//! This module contains route definitions, request/response handlers and the
//! middleware wrapped around them.

pub mod error;
pub mod handlers;
pub mod json;
pub mod middleware;
pub mod routes;

pub use error::{ApiErrorResponse, ErrorBody};
pub use handlers::{
    AppConfig, AppState, CreateMovieRequest, HealthResponse, MovieListResponse,
    UpdateMovieRequest, create_movie, delete_movie, healthcheck, list_movies, show_movie,
    update_movie,
};
pub use json::{
    Envelope, JsonBodyError, JsonResponse, MAX_BODY_BYTES, StrictJson, decode_json, read_json,
};
pub use middleware::{GlobalRateLimiter, LimiterError, LimiterSettings, recover_panic};
pub use routes::router;

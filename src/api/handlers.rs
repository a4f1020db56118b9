//! HTTP handlers for the movie catalog.
//!
//! Every handler returns `Result<_, ApiErrorResponse>` so failures share the
//! `{"error": ...}` shape. Successful bodies are wrapped in an envelope.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
};
use serde::{Deserialize, Serialize};

use super::error::ApiErrorResponse;
use super::json::{Envelope, JsonResponse, StrictJson, read_json};
use super::middleware::GlobalRateLimiter;
use crate::domain::{
    Filters, Metadata, Movie, MovieId, Runtime, Validator, validate_filters, validate_movie,
};
use crate::infrastructure::{MovieQuery, MovieRepository, RepositoryError};

/// Application version reported by the health check.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request header carrying the version the client last read.
pub const EXPECTED_VERSION_HEADER: &str = "X-Expected-Version";

// =============================================================================
// Application Configuration
// =============================================================================

/// Settings exposed to handlers.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Deployment environment name (`development`, `staging`, `production`).
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
        }
    }
}

// =============================================================================
// Application State
// =============================================================================

/// Shared application dependencies.
///
/// The repository is a trait object so the backend can be chosen at startup by
/// `RepositoryFactory`.
#[derive(Clone)]
pub struct AppState {
    /// Movie persistence.
    pub repository: Arc<dyn MovieRepository>,
    /// Application configuration.
    pub config: AppConfig,
    /// Global token bucket; `None` disables rate limiting.
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    /// Creates state with default configuration and no rate limiting.
    #[must_use]
    pub fn new(repository: Arc<dyn MovieRepository>) -> Self {
        Self {
            repository,
            config: AppConfig::default(),
            rate_limiter: None,
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs a rate limiter.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Option<Arc<GlobalRateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

// =============================================================================
// Request and Response Types
// =============================================================================

/// Body of `POST /v1/movies`. Absent fields fall back to zero values and are
/// then reported by validation.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMovieRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
}

/// Body of `PATCH /v1/movies/{id}`. Only the fields present are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMovieRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub runtime: Option<Runtime>,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
}

impl UpdateMovieRequest {
    fn apply(self, movie: Movie) -> Movie {
        Movie {
            title: self.title.unwrap_or(movie.title),
            year: self.year.unwrap_or(movie.year),
            runtime: self.runtime.unwrap_or(movie.runtime),
            genres: self.genres.unwrap_or(movie.genres),
            ..movie
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub system_info: SystemInfo,
}

/// Environment details reported by the health check.
#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub environment: String,
    pub version: &'static str,
}

/// Body of a list response.
#[derive(Debug, Serialize)]
pub struct MovieListResponse {
    pub movies: Vec<Movie>,
    pub metadata: Metadata,
}

/// Body of a delete response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

type MovieResponse = JsonResponse<Envelope<Movie>>;

// =============================================================================
// Handlers
// =============================================================================

/// `GET /v1/healthcheck`
pub async fn healthcheck(State(state): State<AppState>) -> JsonResponse<HealthResponse> {
    JsonResponse::ok(HealthResponse {
        status: "available",
        system_info: SystemInfo {
            environment: state.config.environment.clone(),
            version: VERSION,
        },
    })
}

/// `POST /v1/movies`
///
/// # Errors
///
/// - **400 Bad Request**: the body could not be decoded
/// - **422 Unprocessable Entity**: the movie failed validation
/// - **500 Internal Server Error**: the store failed
pub async fn create_movie(
    State(state): State<AppState>,
    StrictJson(request): StrictJson<CreateMovieRequest>,
) -> Result<MovieResponse, ApiErrorResponse> {
    let mut validator = Validator::new();
    validator.check(request.genres.is_some(), "genres", "must be provided");

    let movie = Movie::new(
        request.title,
        request.year,
        request.runtime,
        request.genres.unwrap_or_default(),
    );
    validate_movie(&mut validator, &movie);
    if !validator.valid() {
        return Err(ApiErrorResponse::failed_validation(validator));
    }

    let movie = state.repository.insert(movie).await?;
    tracing::info!(id = %movie.id, title = %movie.title, "movie created");

    let location = format!("/v1/movies/{}", movie.id);
    Ok(
        JsonResponse::new(StatusCode::CREATED, Envelope::new("movie", movie))
            .with_header(header::LOCATION, &location),
    )
}

/// `GET /v1/movies/{id}`
///
/// # Errors
///
/// - **404 Not Found**: the id is malformed or unknown
/// - **500 Internal Server Error**: the store failed
pub async fn show_movie(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<MovieResponse, ApiErrorResponse> {
    let id = parse_id(&raw_id)?;
    let movie = state.repository.get(id).await?;
    Ok(JsonResponse::ok(Envelope::new("movie", movie)))
}

/// `PATCH /v1/movies/{id}`
///
/// Applies only the fields present in the body. When a non-empty
/// `X-Expected-Version` is sent it must match the stored version. The body is
/// read only after the movie is found and the version check passes.
///
/// # Errors
///
/// - **404 Not Found**: the id is malformed or unknown
/// - **409 Conflict**: the version moved since the client read it
/// - **400 Bad Request**: the body could not be decoded
/// - **422 Unprocessable Entity**: the merged movie failed validation
/// - **500 Internal Server Error**: the store failed
pub async fn update_movie(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<MovieResponse, ApiErrorResponse> {
    let id = parse_id(&raw_id)?;
    let movie = state.repository.get(id).await?;

    if let Some(expected) = headers
        .get(EXPECTED_VERSION_HEADER)
        .filter(|value| !value.is_empty())
        && expected.as_bytes() != movie.version.to_string().as_bytes()
    {
        return Err(ApiErrorResponse::edit_conflict());
    }

    let request: UpdateMovieRequest = read_json(body).await?;
    let movie = request.apply(movie);
    let mut validator = Validator::new();
    validate_movie(&mut validator, &movie);
    if !validator.valid() {
        return Err(ApiErrorResponse::failed_validation(validator));
    }

    let movie = state
        .repository
        .update(movie)
        .await
        .map_err(|error| match error {
            // The row was readable a moment ago, so a miss here is a lost race.
            RepositoryError::NotFound => ApiErrorResponse::edit_conflict(),
            other => ApiErrorResponse::from(other),
        })?;
    tracing::info!(id = %movie.id, version = movie.version, "movie updated");

    Ok(JsonResponse::ok(Envelope::new("movie", movie)))
}

/// `DELETE /v1/movies/{id}`
///
/// # Errors
///
/// - **404 Not Found**: the id is malformed or unknown
/// - **500 Internal Server Error**: the store failed
pub async fn delete_movie(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<JsonResponse<MessageResponse>, ApiErrorResponse> {
    let id = parse_id(&raw_id)?;
    state.repository.delete(id).await?;
    tracing::info!(%id, "movie deleted");

    Ok(JsonResponse::ok(MessageResponse {
        message: "movie successfully deleted",
    }))
}

/// `GET /v1/movies?title=&genres=&page=&page_size=&sort=`
///
/// # Errors
///
/// - **422 Unprocessable Entity**: a query parameter is malformed or out of range
/// - **500 Internal Server Error**: the store failed
pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<JsonResponse<MovieListResponse>, ApiErrorResponse> {
    let mut validator = Validator::new();
    let query = read_movie_query(&params, &mut validator);

    validate_filters(&mut validator, &query.filters);
    if !validator.valid() {
        return Err(ApiErrorResponse::failed_validation(validator));
    }

    let result = state.repository.get_all(query).await?;
    let metadata = result.metadata();
    Ok(JsonResponse::ok(MovieListResponse {
        movies: result.items,
        metadata,
    }))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parses a path id. Anything that is not an integer of at least 1 is a 404.
fn parse_id(raw: &str) -> Result<MovieId, ApiErrorResponse> {
    raw.parse::<MovieId>()
        .ok()
        .filter(|id| id.is_valid())
        .ok_or_else(ApiErrorResponse::not_found)
}

fn read_movie_query(params: &HashMap<String, String>, validator: &mut Validator) -> MovieQuery {
    let defaults = Filters::default();
    MovieQuery {
        title: read_string(params, "title", ""),
        genres: read_csv(params, "genres"),
        filters: Filters {
            page: read_int(params, "page", defaults.page, validator),
            page_size: read_int(params, "page_size", defaults.page_size, validator),
            sort: read_string(params, "sort", &defaults.sort),
            ..defaults
        },
    }
}

fn read_string(params: &HashMap<String, String>, key: &str, default: &str) -> String {
    params
        .get(key)
        .filter(|value| !value.is_empty())
        .map_or_else(|| default.to_string(), Clone::clone)
}

fn read_csv(params: &HashMap<String, String>, key: &str) -> Vec<String> {
    params
        .get(key)
        .filter(|value| !value.is_empty())
        .map(|value| value.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

/// Reads an integer parameter. A malformed value is recorded on `validator`
/// and the default is returned in its place.
fn read_int(
    params: &HashMap<String, String>,
    key: &str,
    default: i64,
    validator: &mut Validator,
) -> i64 {
    match params.get(key).filter(|value| !value.is_empty()) {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            validator.add_error(key, "must be an integer value");
            default
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Common test helpers for integration tests.
//!
//! Builds the full router over the in-memory repository and sends requests
//! through it with `tower::ServiceExt::oneshot`.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::{create_test_router, send, json_request};
//! ```
//!
//! # Note
//!
//! Each integration test file is compiled as its own crate, so helpers unused
//! by one file would otherwise warn as dead code.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use futures::future::BoxFuture;
use movie_catalog_api::api::{AppState, LimiterSettings, router};
use movie_catalog_api::domain::{Filters, Movie, MovieId};
use movie_catalog_api::infrastructure::{
    InMemoryMovieRepository, MovieQuery, MovieRepository, PaginatedResult, RepositoryError,
};

// =============================================================================
// Router Helpers
// =============================================================================

/// Creates `AppState` over an empty in-memory repository with no rate limiting.
pub fn create_test_app_state() -> AppState {
    AppState::new(Arc::new(InMemoryMovieRepository::new()))
}

/// Full router without rate limiting.
pub fn create_test_router() -> Router {
    router(create_test_app_state())
}

/// Full router with the given limiter settings.
pub fn create_rate_limited_router(settings: LimiterSettings) -> Router {
    let limiter = settings.build().expect("valid limiter settings");
    router(create_test_app_state().with_rate_limiter(limiter))
}

/// Full router over a repository that fails every call with `fault`.
pub fn create_faulty_router(fault: Fault) -> Router {
    router(AppState::new(Arc::new(FaultyMovieRepository { fault })))
}

// =============================================================================
// Faulty Repository
// =============================================================================

/// How [`FaultyMovieRepository`] fails.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Resolves a sort column from an unvalidated key, which panics.
    UnsafeSort,
    /// Never answers within the request timeout.
    Stall,
}

/// Repository whose every operation trips the configured fault.
#[derive(Debug)]
pub struct FaultyMovieRepository {
    fault: Fault,
}

impl FaultyMovieRepository {
    async fn trip<T>(&self, sort: String) -> Result<T, RepositoryError> {
        match self.fault {
            Fault::UnsafeSort => {
                let filters = Filters {
                    sort,
                    ..Filters::default()
                };
                Err(RepositoryError::DatabaseError(format!(
                    "sorted by {}",
                    filters.sort_column()
                )))
            }
            Fault::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(RepositoryError::Timeout)
            }
        }
    }
}

const UNSAFE_SORT: &str = "year; DROP TABLE movies";

impl MovieRepository for FaultyMovieRepository {
    fn insert(&self, _movie: Movie) -> BoxFuture<'_, Result<Movie, RepositoryError>> {
        Box::pin(self.trip(UNSAFE_SORT.to_string()))
    }

    fn get(&self, _id: MovieId) -> BoxFuture<'_, Result<Movie, RepositoryError>> {
        Box::pin(self.trip(UNSAFE_SORT.to_string()))
    }

    fn update(&self, _movie: Movie) -> BoxFuture<'_, Result<Movie, RepositoryError>> {
        Box::pin(self.trip(UNSAFE_SORT.to_string()))
    }

    fn delete(&self, _id: MovieId) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(self.trip(UNSAFE_SORT.to_string()))
    }

    fn get_all(
        &self,
        query: MovieQuery,
    ) -> BoxFuture<'_, Result<PaginatedResult<Movie>, RepositoryError>> {
        Box::pin(self.trip(format!("{}; DROP TABLE movies", query.filters.sort)))
    }
}

// =============================================================================
// Request Helpers
// =============================================================================

/// A collected response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub raw: String,
    pub body: Value,
}

/// Sends `request` through a clone of `router` and collects the response.
pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let raw = String::from_utf8(bytes.to_vec()).expect("utf-8 body");
    let body = serde_json::from_str(&raw).unwrap_or(Value::Null);

    TestResponse {
        status,
        headers,
        raw,
        body,
    }
}

/// Builds a request with no body.
pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

/// Builds a request with a raw JSON body.
pub fn json_request(method: Method, uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .expect("valid request")
}

/// `GET uri`.
pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(router, empty_request(Method::GET, uri)).await
}

/// Builds a request with a raw JSON body and an `X-Expected-Version` header.
pub fn versioned_request(method: Method, uri: &str, version: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Expected-Version", version)
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// Creates a movie and returns the `movie` object of the response.
pub async fn create_movie(
    router: &Router,
    title: &str,
    year: i32,
    runtime: i32,
    genres: &[&str],
) -> Value {
    let body = serde_json::json!({
        "title": title,
        "year": year,
        "runtime": format!("{runtime} mins"),
        "genres": genres,
    });
    let response = send(
        router,
        json_request(Method::POST, "/v1/movies", body.to_string()),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.raw);
    response.body["movie"].clone()
}

/// Seeds a small catalog and returns the router.
pub async fn create_seeded_router() -> Router {
    let router = create_test_router();
    create_movie(&router, "Moana", 2016, 107, &["animation", "adventure"]).await;
    create_movie(&router, "Black Panther", 2018, 134, &["action", "adventure"]).await;
    create_movie(&router, "Deadpool", 2016, 108, &["action", "comedy"]).await;
    create_movie(&router, "The Breakfast Club", 1986, 96, &["drama"]).await;
    router
}

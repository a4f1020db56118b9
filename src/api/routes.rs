//! Router assembly.

use std::time::Duration;

use axum::{Router, error_handling::HandleErrorLayer, extract::Request, middleware, routing::get};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;

use super::handlers::{
    AppState, create_movie, delete_movie, healthcheck, list_movies, show_movie, update_movie,
};
use super::middleware::{
    method_not_allowed, not_found, rate_limit, recover_panic, request_timed_out,
};

/// Requests taking longer than this are abandoned.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens the per-request span at INFO so events logged while handling a
/// request, including 500 causes, carry its method and URI.
fn request_span(request: &Request) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
    )
}

/// Builds the application router with all middleware installed.
///
/// Layer order from the outside in: CORS, tracing, timeout, panic recovery,
/// rate limiting. Fallback responses pass through the limiter as well.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/healthcheck", get(healthcheck))
        .route("/v1/movies", get(list_movies).post(create_movie))
        .route(
            "/v1/movies/{id}",
            get(show_movie).patch(update_movie).delete(delete_movie),
        )
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(CatchPanicLayer::custom(recover_panic))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(request_timed_out))
                .timeout(REQUEST_TIMEOUT),
        )
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(cors)
        .with_state(state)
}

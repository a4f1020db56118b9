//! Request middleware: rate limiting, panic recovery, timeouts and JSON fallbacks.

use std::any::Any;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    BoxError,
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use thiserror::Error;

use super::error::ApiErrorResponse;
use super::handlers::AppState;

// =============================================================================
// Rate Limiting
// =============================================================================

/// Single token bucket shared by every client.
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterSettings {
    /// Tokens added per second.
    pub rps: f64,
    /// Bucket capacity.
    pub burst: u32,
    /// When false no limiter is built.
    pub enabled: bool,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            rps: 2.0,
            burst: 4,
            enabled: true,
        }
    }
}

/// Rejected limiter parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LimiterError {
    #[error("limiter-rps must be a positive number, got {0}")]
    InvalidRate(f64),

    #[error("limiter-burst must be greater than zero")]
    InvalidBurst,
}

impl LimiterSettings {
    /// Builds the limiter, or `None` when limiting is disabled.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError` if the rate is not a positive finite number or
    /// the burst is zero.
    pub fn build(&self) -> Result<Option<Arc<GlobalRateLimiter>>, LimiterError> {
        if !self.enabled {
            return Ok(None);
        }

        let burst = NonZeroU32::new(self.burst).ok_or(LimiterError::InvalidBurst)?;
        let period = (self.rps.is_finite() && self.rps > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / self.rps).ok())
            .flatten()
            .ok_or(LimiterError::InvalidRate(self.rps))?;
        let quota = Quota::with_period(period)
            .ok_or(LimiterError::InvalidRate(self.rps))?
            .allow_burst(burst);

        Ok(Some(Arc::new(RateLimiter::direct(quota))))
    }
}

/// Rejects the request with 429 when the global bucket is empty.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(limiter) = &state.rate_limiter
        && limiter.check().is_err()
    {
        tracing::warn!(
            method = %request.method(),
            uri = %request.uri(),
            "rate limit exceeded"
        );
        return ApiErrorResponse::rate_limit_exceeded().into_response();
    }
    next.run(request).await
}

// =============================================================================
// Panic Recovery
// =============================================================================

/// Turns a handler panic into a 500 and asks the client to drop the connection.
///
/// Installed with `CatchPanicLayer::custom`.
#[allow(clippy::needless_pass_by_value)]
pub fn recover_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    let mut response = ApiErrorResponse::server_error(format!("panic: {message}")).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

// =============================================================================
// Timeouts
// =============================================================================

/// Renders errors from the timeout layer. Installed with `HandleErrorLayer`.
pub async fn request_timed_out(method: Method, error: BoxError) -> ApiErrorResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!(%method, "request timed out");
        ApiErrorResponse::request_timeout()
    } else {
        ApiErrorResponse::server_error(error)
    }
}

// =============================================================================
// Fallbacks
// =============================================================================

/// 404 for paths no route matches.
pub async fn not_found() -> ApiErrorResponse {
    ApiErrorResponse::not_found()
}

/// 405 for a known path requested with an unsupported method.
pub async fn method_not_allowed(method: Method) -> ApiErrorResponse {
    ApiErrorResponse::method_not_allowed(&method)
}

// =============================================================================
// Tests
// =============================================================================

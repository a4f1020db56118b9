//! Integration tests for the `/v1` endpoints.
//!
//! Every test drives the full router (fallbacks and middleware included) over
//! the in-memory repository.
//!
//! # Tests Covered
//!
//! - Health check and response formatting
//! - Create, show, update, delete
//! - Optimistic locking via `X-Expected-Version`
//! - List filtering, sorting and paging
//! - Strict JSON decoding errors
//! - 404/405 fallbacks, rate limiting, panic recovery, request timeout

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rstest::rstest;
use serde_json::json;

use common::{
    Fault, create_faulty_router, create_movie, create_rate_limited_router, create_seeded_router,
    create_test_router, empty_request, get, json_request, send, versioned_request,
};
use movie_catalog_api::api::LimiterSettings;

fn ids(body: &serde_json::Value) -> Vec<i64> {
    body["movies"]
        .as_array()
        .expect("movies array")
        .iter()
        .map(|movie| movie["id"].as_i64().expect("numeric id"))
        .collect()
}

// =============================================================================
// GET /v1/healthcheck
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_healthcheck_reports_status() {
    let router = create_test_router();
    let response = get(&router, "/v1/healthcheck").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({
            "status": "available",
            "system_info": {
                "environment": "development",
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    );
}

#[rstest]
#[tokio::test]
async fn test_responses_are_indented_json_with_trailing_newline() {
    let router = create_test_router();
    let response = get(&router, "/v1/healthcheck").await;

    assert_eq!(
        response.headers.get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert!(response.raw.starts_with("{\n  \"status\""));
    assert!(response.raw.ends_with("}\n"));
}

// =============================================================================
// POST /v1/movies
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_create_movie_returns_location_and_movie() {
    let router = create_test_router();
    let body = json!({
        "title": "Moana",
        "year": 2016,
        "runtime": "107 mins",
        "genres": ["animation", "adventure"],
    });
    let response = send(
        &router,
        json_request(Method::POST, "/v1/movies", body.to_string()),
    )
    .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(
        response.headers.get(header::LOCATION).unwrap(),
        "/v1/movies/1"
    );
    assert_eq!(
        response.body,
        json!({
            "movie": {
                "id": 1,
                "title": "Moana",
                "year": 2016,
                "runtime": "107 mins",
                "genres": ["animation", "adventure"],
                "version": 1,
            }
        })
    );
}

#[rstest]
#[tokio::test]
async fn test_create_movie_reports_every_missing_field() {
    let router = create_test_router();
    let response = send(&router, json_request(Method::POST, "/v1/movies", "{}")).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.body,
        json!({
            "error": {
                "title": "must be provided",
                "year": "must be provided",
                "runtime": "must be provided",
                "genres": "must be provided",
            }
        })
    );
}

#[rstest]
#[case(json!({"title": "Moana", "year": 1800, "runtime": "107 mins", "genres": ["animation"]}), "year", "must be greater than 1888")]
#[case(json!({"title": "Moana", "year": 2016, "runtime": "-1 mins", "genres": ["animation"]}), "runtime", "must be a positive integer")]
#[case(json!({"title": "Moana", "year": 2016, "runtime": "107 mins", "genres": []}), "genres", "must contain at least 1 genre")]
#[case(json!({"title": "Moana", "year": 2016, "runtime": "107 mins", "genres": ["a", "a"]}), "genres", "must not contain duplicate values")]
#[case(json!({"title": "Moana", "year": 2016, "runtime": "107 mins", "genres": ["a", "b", "c", "d", "e", "f"]}), "genres", "must not contain more than 5 genres")]
#[tokio::test]
async fn test_create_movie_validation_messages(
    #[case] body: serde_json::Value,
    #[case] field: &str,
    #[case] message: &str,
) {
    let router = create_test_router();
    let response = send(
        &router,
        json_request(Method::POST, "/v1/movies", body.to_string()),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"][field], message);
}

#[rstest]
#[case("", "body must not be empty")]
#[case(r#"{"title": "Moana", }"#, "body contains badly-formed JSON (at character 20)")]
#[case(r#"{"title": "Moana""#, "body contains badly-formed JSON")]
#[case(r#"{"rating": 5}"#, "body contains unknown key \"rating\"")]
#[case(r#"{"title": "Moana"} {"title": "Up"}"#, "body must only contain a single JSON value")]
#[case(r#"{"runtime": "107 minutes"}"#, "invalid runtime format")]
#[case(r#"{"runtime": 107}"#, "invalid runtime format")]
#[tokio::test]
async fn test_create_movie_rejects_malformed_body(#[case] body: &str, #[case] message: &str) {
    let router = create_test_router();
    let response = send(&router, json_request(Method::POST, "/v1/movies", body)).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({"error": message}));
}

#[rstest]
#[case(r#"{"title": 123}"#, "title")]
#[case(r#"{"year": "2016"}"#, "year")]
#[case(r#"{"year": 99999999999}"#, "year")]
#[case(r#"{"genres": "drama"}"#, "genres")]
#[case(r#"{"genres": ["drama", 5]}"#, "genres")]
#[tokio::test]
async fn test_create_movie_rejects_wrong_json_type(#[case] body: &str, #[case] field: &str) {
    let router = create_test_router();
    let response = send(&router, json_request(Method::POST, "/v1/movies", body)).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": format!("body contains incorrect JSON type for field \"{field}\"")})
    );
}

#[rstest]
#[tokio::test]
async fn test_create_movie_rejects_top_level_string() {
    let router = create_test_router();
    let response = send(&router, json_request(Method::POST, "/v1/movies", r#""Moana""#)).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let message = response.body["error"].as_str().unwrap();
    assert!(message.starts_with("body contains incorrect JSON type (at character"), "{message}");
}

#[rstest]
#[tokio::test]
async fn test_create_movie_rejects_oversized_body() {
    let router = create_test_router();
    let title = "a".repeat(1_048_576);
    let body = format!(r#"{{"title": "{title}"}}"#);
    let response = send(&router, json_request(Method::POST, "/v1/movies", body)).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "body must not be larger than 1048576 bytes"})
    );
}

// =============================================================================
// GET /v1/movies/{id}
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_show_movie_returns_stored_movie() {
    let router = create_seeded_router().await;
    let response = get(&router, "/v1/movies/2").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["movie"]["title"], "Black Panther");
    assert_eq!(response.body["movie"]["runtime"], "134 mins");
}

#[rstest]
#[case("/v1/movies/99")]
#[case("/v1/movies/0")]
#[case("/v1/movies/-1")]
#[case("/v1/movies/abc")]
#[tokio::test]
async fn test_show_movie_not_found(#[case] uri: &str) {
    let router = create_seeded_router().await;
    let response = get(&router, uri).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.body,
        json!({"error": "the requested resource could not be found"})
    );
}

// =============================================================================
// PATCH /v1/movies/{id}
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_update_movie_applies_present_fields_only() {
    let router = create_seeded_router().await;
    let response = send(
        &router,
        json_request(Method::PATCH, "/v1/movies/1", r#"{"year": 2017}"#),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let movie = &response.body["movie"];
    assert_eq!(movie["year"], 2017);
    assert_eq!(movie["title"], "Moana");
    assert_eq!(movie["runtime"], "107 mins");
    assert_eq!(movie["version"], 2);
}

#[rstest]
#[tokio::test]
async fn test_update_movie_with_matching_expected_version() {
    let router = create_seeded_router().await;
    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/v1/movies/3")
        .header("X-Expected-Version", "1")
        .body(Body::from(r#"{"title": "Deadpool 2"}"#))
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["movie"]["title"], "Deadpool 2");
    assert_eq!(response.body["movie"]["version"], 2);
}

#[rstest]
#[tokio::test]
async fn test_update_movie_with_stale_expected_version_conflicts() {
    let router = create_seeded_router().await;
    send(
        &router,
        json_request(Method::PATCH, "/v1/movies/3", r#"{"year": 2017}"#),
    )
    .await;

    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/v1/movies/3")
        .header("X-Expected-Version", "1")
        .body(Body::from(r#"{"year": 2018}"#))
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(
        response.body,
        json!({"error": "unable to update the record due to an edit conflict, please try again"})
    );

    let current = get(&router, "/v1/movies/3").await;
    assert_eq!(current.body["movie"]["year"], 2017);
}

#[rstest]
#[tokio::test]
async fn test_update_movie_validates_merged_movie() {
    let router = create_seeded_router().await;
    let response = send(
        &router,
        json_request(Method::PATCH, "/v1/movies/1", r#"{"title": ""}"#),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body, json!({"error": {"title": "must be provided"}}));
}

#[rstest]
#[tokio::test]
async fn test_update_missing_movie_not_found() {
    let router = create_test_router();
    let response = send(
        &router,
        json_request(Method::PATCH, "/v1/movies/7", r#"{"year": 2017}"#),
    )
    .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[rstest]
#[case("/v1/movies/99")]
#[case("/v1/movies/abc")]
#[tokio::test]
async fn test_update_missing_movie_checked_before_body(#[case] uri: &str) {
    let router = create_seeded_router().await;
    let response = send(&router, json_request(Method::PATCH, uri, "{bad")).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[rstest]
#[case(r#"{"rating": 1}"#)]
#[case("{bad")]
#[case("")]
#[tokio::test]
async fn test_update_stale_version_checked_before_body(#[case] body: &str) {
    let router = create_seeded_router().await;
    let response = send(
        &router,
        versioned_request(Method::PATCH, "/v1/movies/1", "7", body),
    )
    .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[rstest]
#[tokio::test]
async fn test_update_matching_version_then_rejects_bad_body() {
    let router = create_seeded_router().await;
    let response = send(
        &router,
        versioned_request(Method::PATCH, "/v1/movies/1", "1", r#"{"rating": 1}"#),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "body contains unknown key \"rating\""})
    );
}

// =============================================================================
// DELETE /v1/movies/{id}
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_delete_movie_then_show_not_found() {
    let router = create_seeded_router().await;
    let response = send(&router, empty_request(Method::DELETE, "/v1/movies/4")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"message": "movie successfully deleted"}));

    assert_eq!(get(&router, "/v1/movies/4").await.status, StatusCode::NOT_FOUND);
    let again = send(&router, empty_request(Method::DELETE, "/v1/movies/4")).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// GET /v1/movies
// =============================================================================

#[rstest]
#[case("/v1/movies", vec![1, 2, 3, 4])]
#[case("/v1/movies?title=panther", vec![2])]
#[case("/v1/movies?title=black+panther", vec![2])]
#[case("/v1/movies?genres=adventure", vec![1, 2])]
#[case("/v1/movies?genres=action,adventure", vec![2])]
#[case("/v1/movies?sort=-year", vec![2, 1, 3, 4])]
#[case("/v1/movies?sort=title", vec![2, 3, 1, 4])]
#[case("/v1/movies?sort=runtime", vec![4, 1, 3, 2])]
#[case("/v1/movies?page=2&page_size=3", vec![4])]
#[tokio::test]
async fn test_list_movies_filters_and_sorts(#[case] uri: &str, #[case] expected: Vec<i64>) {
    let router = create_seeded_router().await;
    let response = get(&router, uri).await;

    assert_eq!(response.status, StatusCode::OK, "{}", response.raw);
    assert_eq!(ids(&response.body), expected);
}

#[rstest]
#[tokio::test]
async fn test_list_movies_metadata() {
    let router = create_seeded_router().await;
    let response = get(&router, "/v1/movies?page=2&page_size=2").await;

    assert_eq!(ids(&response.body), vec![3, 4]);
    assert_eq!(
        response.body["metadata"],
        json!({
            "current_page": 2,
            "page_size": 2,
            "first_page": 1,
            "last_page": 2,
            "total_records": 4,
        })
    );
}

#[rstest]
#[tokio::test]
async fn test_list_movies_page_past_end_keeps_total() {
    let router = create_seeded_router().await;
    let response = get(&router, "/v1/movies?page=10").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(ids(&response.body), Vec::<i64>::new());
    assert_eq!(
        response.body["metadata"],
        json!({
            "current_page": 10,
            "page_size": 20,
            "first_page": 1,
            "last_page": 1,
            "total_records": 4,
        })
    );
}

#[rstest]
#[tokio::test]
async fn test_list_movies_empty_result_has_empty_metadata() {
    let router = create_seeded_router().await;
    let response = get(&router, "/v1/movies?title=godfather").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"movies": [], "metadata": {}}));
}

#[rstest]
#[case("/v1/movies?page=abc", "page", "must be an integer value")]
#[case("/v1/movies?page_size=x", "page_size", "must be an integer value")]
#[case("/v1/movies?page=0", "page", "must be greater than zero")]
#[case("/v1/movies?page=10000001", "page", "must be a maximum of 10 million")]
#[case("/v1/movies?page_size=101", "page_size", "must be a maximum of 100")]
#[case("/v1/movies?sort=rating", "sort", "invalid sort value")]
#[tokio::test]
async fn test_list_movies_rejects_bad_parameters(
    #[case] uri: &str,
    #[case] field: &str,
    #[case] message: &str,
) {
    let router = create_test_router();
    let response = get(&router, uri).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"][field], message);
}

// =============================================================================
// Fallbacks
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_unknown_route_returns_json_not_found() {
    let router = create_test_router();
    let response = get(&router, "/v2/shows").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.body,
        json!({"error": "the requested resource could not be found"})
    );
}

#[rstest]
#[case(Method::PUT, "/v1/movies/1")]
#[case(Method::DELETE, "/v1/movies")]
#[case(Method::POST, "/v1/healthcheck")]
#[tokio::test]
async fn test_unsupported_method_returns_json_method_not_allowed(
    #[case] method: Method,
    #[case] uri: &str,
) {
    let router = create_test_router();
    let response = send(&router, empty_request(method.clone(), uri)).await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.body,
        json!({"error": format!("the {method} method is not supported for this resource")})
    );
}

// =============================================================================
// Middleware
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_rate_limiter_rejects_after_burst() {
    let router = create_rate_limited_router(LimiterSettings {
        rps: 0.1,
        burst: 4,
        enabled: true,
    });

    for _ in 0..4 {
        assert_eq!(get(&router, "/v1/healthcheck").await.status, StatusCode::OK);
    }
    let response = get(&router, "/v1/healthcheck").await;

    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.body, json!({"error": "rate limit exceeded"}));
}

#[rstest]
#[tokio::test]
async fn test_disabled_rate_limiter_never_rejects() {
    let router = create_rate_limited_router(LimiterSettings {
        rps: 0.1,
        burst: 1,
        enabled: false,
    });

    for _ in 0..10 {
        assert_eq!(get(&router, "/v1/healthcheck").await.status, StatusCode::OK);
    }
}

#[rstest]
#[tokio::test]
async fn test_panic_becomes_json_server_error() {
    let router = create_faulty_router(Fault::UnsafeSort);

    let response = get(&router, "/v1/movies?sort=-year").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers.get(header::CONNECTION).unwrap(), "close");
    assert_eq!(
        response.body,
        json!({"error": "the server encountered a problem and could not process your request"})
    );

    let response = get(&router, "/v1/healthcheck").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "available");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_stalled_request_times_out_with_json_error() {
    let router = create_faulty_router(Fault::Stall);
    let response = get(&router, "/v1/movies/1").await;

    assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(
        response.body,
        json!({"error": "the request took too long to process"})
    );
}

// =============================================================================
// Full Lifecycle
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_movie_lifecycle() {
    let router = create_test_router();
    let created = create_movie(&router, "Casablanca", 1942, 102, &["drama", "romance"]).await;
    let id = created["id"].as_i64().unwrap();
    let uri = format!("/v1/movies/{id}");

    let updated = send(
        &router,
        json_request(Method::PATCH, &uri, r#"{"genres": ["drama", "war"]}"#),
    )
    .await;
    assert_eq!(updated.body["movie"]["genres"], json!(["drama", "war"]));
    assert_eq!(updated.body["movie"]["version"], 2);

    let listed = get(&router, "/v1/movies?genres=war").await;
    assert_eq!(ids(&listed.body), vec![id]);

    let deleted = send(&router, empty_request(Method::DELETE, &uri)).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(get(&router, &uri).await.status, StatusCode::NOT_FOUND);
}

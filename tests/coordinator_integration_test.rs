//! Integration tests for the request coordinator: de-duplication of
//! concurrent calls, response caching and fixed-delay retries.

mod common;

use common::*;
use fitsync::coordinator::{RequestCoordinator, RetryPolicy};
use std::time::Duration;
use tokio::time::Instant;

const URL: &str = "http://backend.test/resource";

fn coordinator(max_retries: u32) -> RequestCoordinator {
    RequestCoordinator::new(
        Duration::from_millis(300_000),
        RetryPolicy::new(max_retries, Duration::from_millis(2_000)),
    )
}

async fn call(
    coordinator: &RequestCoordinator,
    http: &MockHttpClient,
    key: &str,
) -> Result<Response, HttpError> {
    let http = http.clone();
    coordinator
        .execute(key, move || {
            let http = http.clone();
            async move { http.get(URL, &Headers::new()).await?.error_for_status() }
        })
        .await
}

async fn call_fresh(
    coordinator: &RequestCoordinator,
    http: &MockHttpClient,
    key: &str,
) -> Result<Response, HttpError> {
    let http = http.clone();
    coordinator
        .execute_fresh(key, move || {
            let http = http.clone();
            async move { http.get(URL, &Headers::new()).await?.error_for_status() }
        })
        .await
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_one_request() {
    let http = MockHttpClient::new();
    http.set_response(URL, MockResponse::json(200, serde_json::json!({"n": 1})));
    http.set_delay(Duration::from_millis(500));
    let coordinator = coordinator(3);

    let (a, b, c) = tokio::join!(
        call(&coordinator, &http, "shared"),
        call(&coordinator, &http, "shared"),
        call(&coordinator, &http, "shared"),
    );

    assert_eq!(http.request_count("GET", URL), 1);
    let a = a.unwrap();
    assert_eq!(a.status, 200);
    assert_eq!(a.body, b.unwrap().body);
    assert_eq!(a.body, c.unwrap().body);
    assert_eq!(coordinator.in_flight_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_failure_reaches_every_waiter() {
    let http = MockHttpClient::new();
    http.set_response(URL, MockResponse::status(403));
    http.set_delay(Duration::from_millis(100));
    let coordinator = coordinator(3);

    let (a, b) = tokio::join!(
        call(&coordinator, &http, "denied"),
        call(&coordinator, &http, "denied"),
    );

    assert_eq!(a.unwrap_err().status(), Some(403));
    assert_eq!(b.unwrap_err().status(), Some(403));
    assert_eq!(http.request_count("GET", URL), 1);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_keys_do_not_share() {
    let http = MockHttpClient::new();
    http.set_response(URL, MockResponse::status(200));
    http.set_delay(Duration::from_millis(100));
    let coordinator = coordinator(0);

    let (a, b) = tokio::join!(
        call(&coordinator, &http, "one"),
        call(&coordinator, &http, "two"),
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(http.request_count("GET", URL), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cached_until_timeout() {
    let http = MockHttpClient::new();
    http.set_response(URL, MockResponse::status(200));
    let coordinator = coordinator(0);

    call(&coordinator, &http, "cached").await.unwrap();
    tokio::time::advance(Duration::from_secs(299)).await;
    call(&coordinator, &http, "cached").await.unwrap();
    assert_eq!(http.request_count("GET", URL), 1);
    assert_eq!(coordinator.cached_entry_count().await, 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    call(&coordinator, &http, "cached").await.unwrap();
    assert_eq!(http.request_count("GET", URL), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_not_cached() {
    let http = MockHttpClient::new();
    http.set_responses(URL, vec![MockResponse::status(404), MockResponse::status(200)]);
    let coordinator = coordinator(0);

    assert!(call(&coordinator, &http, "flaky").await.is_err());
    assert_eq!(coordinator.cached_entry_count().await, 0);

    assert!(call(&coordinator, &http, "flaky").await.is_ok());
    assert_eq!(http.request_count("GET", URL), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_calls_bypass_cache() {
    let http = MockHttpClient::new();
    http.set_response(URL, MockResponse::status(200));
    let coordinator = coordinator(0);

    call_fresh(&coordinator, &http, "write").await.unwrap();
    call_fresh(&coordinator, &http, "write").await.unwrap();

    assert_eq!(http.request_count("GET", URL), 2);
    assert_eq!(coordinator.cached_entry_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_transient_failures_with_fixed_delay() {
    let http = MockHttpClient::new();
    http.set_response(URL, MockResponse::status(503));
    let coordinator = coordinator(3);

    let started = Instant::now();
    let err = call(&coordinator, &http, "down").await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    // One attempt plus three retries, two seconds apart
    assert_eq!(http.request_count("GET", URL), 4);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(7), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_within_retry_budget() {
    let http = MockHttpClient::new();
    http.set_responses(
        URL,
        vec![
            MockResponse::status(503),
            MockResponse::Error(HttpError::ConnectionFailed("reset".into())),
            MockResponse::status(200),
        ],
    );
    let coordinator = coordinator(3);

    let response = call(&coordinator, &http, "recovering").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(http.request_count("GET", URL), 3);
}

#[tokio::test(start_paused = true)]
async fn test_definitive_answers_are_not_retried() {
    for status in [400, 401, 403, 404] {
        let http = MockHttpClient::new();
        http.set_response(URL, MockResponse::status(status));
        let coordinator = coordinator(3);

        let err = call(&coordinator, &http, "definitive").await.unwrap_err();
        assert_eq!(err.status(), Some(status));
        assert_eq!(
            http.request_count("GET", URL),
            1,
            "status {} must not be retried",
            status
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_prefix_drops_matching_entries() {
    let http = MockHttpClient::new();
    http.set_response(URL, MockResponse::status(200));
    let coordinator = coordinator(0);

    call(&coordinator, &http, "activities:u1:0").await.unwrap();
    call(&coordinator, &http, "activities:u1:100").await.unwrap();
    call(&coordinator, &http, "user-data:u1").await.unwrap();
    assert_eq!(coordinator.cached_entry_count().await, 3);

    assert_eq!(coordinator.invalidate_prefix("activities:u1:").await, 2);
    assert_eq!(coordinator.cached_entry_count().await, 1);
    assert!(coordinator.invalidate("user-data:u1").await);
    assert!(!coordinator.invalidate("user-data:u1").await);
}

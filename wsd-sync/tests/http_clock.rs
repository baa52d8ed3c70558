//! HttpReferenceClock against an in-process axum server

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use reqwest::Url;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use wsd_sync::clock::{ClockOffsetEstimator, HttpReferenceClock, ReferenceClock, SyncSnapshot};
use wsd_sync::SyncError;

const TIMEOUT: Duration = Duration::from_secs(2);

/// Serve `router` on an ephemeral port and return the /api/time URL
async fn serve(router: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{}/api/time", addr)).unwrap()
}

#[tokio::test]
async fn test_fetch_parses_time_payload() {
    let url = serve(Router::new().route(
        "/api/time",
        get(|| async { Json(json!({ "epoch": 1700000000.25, "targetLatency": 3.0 })) }),
    ))
    .await;

    let clock = HttpReferenceClock::new(url, TIMEOUT).unwrap();
    let payload = clock.fetch().await.unwrap();

    assert_eq!(payload.epoch, Some(1700000000.25));
    assert_eq!(payload.target_latency, Some(3.0));
}

#[tokio::test]
async fn test_snapshot_from_live_server() {
    let url = serve(Router::new().route(
        "/api/time",
        get(|| async { Json(json!({ "epoch": 1700000000.0, "targetLatency": 2.5 })) }),
    ))
    .await;

    let estimator = ClockOffsetEstimator::with_wall_clock(
        HttpReferenceClock::new(url, TIMEOUT).unwrap(),
        || 1_700_000_001_000_i64,
    );
    let outcome = estimator
        .fetch_sync_snapshot(SyncSnapshot::initial(2.0).unwrap())
        .await;

    assert!(outcome.is_refreshed());
    assert_eq!(outcome.snapshot().clock_offset_ms, -1000);
    assert_eq!(outcome.snapshot().target_latency_seconds, 2.5);
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let url = serve(Router::new().route("/api/time", get(|| async { "not json" }))).await;

    let clock = HttpReferenceClock::new(url, TIMEOUT).unwrap();
    let err = clock.fetch().await.unwrap_err();

    assert!(matches!(err, SyncError::Malformed(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_server_error_is_unavailable_and_keeps_prior() {
    let url = serve(Router::new().route(
        "/api/time",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;

    let clock = HttpReferenceClock::new(url, TIMEOUT).unwrap();
    let err = clock.fetch().await.unwrap_err();
    match &err {
        SyncError::Unavailable(reason) => assert!(reason.contains("HTTP 500"), "{}", reason),
        other => panic!("expected Unavailable, got {:?}", other),
    }

    let prior = SyncSnapshot {
        clock_offset_ms: 42,
        target_latency_seconds: 1.5,
    };
    let outcome = ClockOffsetEstimator::new(clock).fetch_sync_snapshot(prior).await;
    assert!(!outcome.is_refreshed());
    assert_eq!(outcome.snapshot(), prior);
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{}/api/time", addr)).unwrap();
    let clock = HttpReferenceClock::new(url, TIMEOUT).unwrap();

    assert!(matches!(
        clock.fetch().await,
        Err(SyncError::Unavailable(_))
    ));
}

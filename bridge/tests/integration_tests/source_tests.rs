//! Integration tests for rate-limited trace retrieval.
//!
//! Tests cover:
//! - Multi-page listings and fail-soft handling of later pages
//! - Root-span filtering on fetched traces
//! - `GetTrace` throughput under a configured rate and burst
//! - Cancellation of waits and in-flight calls

use bridge::BridgeError;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tonic::Status;

use super::common::{record, span, throttled_source, unthrottled_source, FakeBackend};

#[tokio::test]
async fn test_listing_spans_pages() {
    let backend = Arc::new(FakeBackend::default());
    backend.push_page(vec![record("a1", vec![span(1, 0, "root")])], "next");
    backend.push_page(vec![record("a2", vec![span(2, 0, "root")])], "");
    let source = unthrottled_source(backend.clone());

    let traces = source
        .list_recent_traces(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(backend.list_calls(), 2);
    let ids: Vec<&str> = traces.iter().map(|t| t.trace_id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2"]);
}

#[tokio::test]
async fn test_listing_keeps_pages_before_failure() {
    let backend = Arc::new(FakeBackend::default());
    backend.push_page(vec![record("a1", vec![])], "p2");
    backend.push_page(vec![record("a2", vec![])], "p3");
    backend.push_list_error(Status::resource_exhausted("quota"));
    let source = unthrottled_source(backend.clone());

    let traces = source
        .list_recent_traces(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(backend.list_calls(), 3);
    assert_eq!(traces.len(), 2);
}

#[tokio::test]
async fn test_first_page_failure_is_reported() {
    let backend = Arc::new(FakeBackend::failing_list());
    let source = unthrottled_source(backend);

    let err = source
        .list_recent_traces(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::BackendCall(ref s) if s.code() == tonic::Code::Unavailable));
    assert!(!err.is_cancellation());
}

#[tokio::test]
async fn test_fetch_keeps_only_root_spans() {
    let backend = Arc::new(FakeBackend::with_traces(vec![record(
        "abc123",
        vec![span(42, 0, "handler"), span(43, 42, "db"), span(44, 43, "rpc")],
    )]));
    let source = unthrottled_source(backend);

    let roots = source
        .fetch_root_spans("abc123", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].span_id, 42);
    assert_eq!(roots[0].name, "handler");
    assert_eq!(roots[0].parent_span_id, None);
    assert_eq!(roots[0].start_time.seconds, 100);
    assert_eq!(roots[0].end_time.nanos, 500_000_000);
}

#[tokio::test]
async fn test_get_rate_limit_bounds_throughput() {
    let backend = Arc::new(FakeBackend::with_traces(vec![record("abc123", vec![])]));
    // r = 10/s, b = 2: five calls need at least (5 - 2) / 10 s.
    let source = throttled_source(
        backend.clone(),
        NonZeroU32::new(10).unwrap(),
        NonZeroU32::new(2).unwrap(),
    );
    let cancel = CancellationToken::new();

    let start = Instant::now();
    for _ in 0..5 {
        source.fetch_root_spans("abc123", &cancel).await.unwrap();
    }

    assert!(start.elapsed() >= Duration::from_millis(280));
    assert_eq!(backend.get_calls(), 5);
}

#[tokio::test]
async fn test_cancelled_permit_wait_skips_call() {
    let backend = Arc::new(FakeBackend::with_traces(vec![record("abc123", vec![])]));
    let one = NonZeroU32::new(1).unwrap();
    let source = Arc::new(throttled_source(backend.clone(), one, one));
    let cancel = CancellationToken::new();

    source.fetch_root_spans("abc123", &cancel).await.unwrap();

    let waiter = {
        let source = Arc::clone(&source);
        let cancel = cancel.clone();
        tokio::spawn(async move { source.fetch_root_spans("abc123", &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(BridgeError::RateLimitExceeded("get"))));
    assert_eq!(backend.get_calls(), 1);
}

#[tokio::test]
async fn test_cancelled_call_returns_promptly() {
    let backend = Arc::new(
        FakeBackend::with_traces(vec![record("abc123", vec![])])
            .with_get_delay(Duration::from_secs(3600)),
    );
    let source = Arc::new(unthrottled_source(backend.clone()));
    let cancel = CancellationToken::new();

    let call = {
        let source = Arc::clone(&source);
        let cancel = cancel.clone();
        tokio::spawn(async move { source.fetch_root_spans("abc123", &cancel).await })
    };
    while backend.get_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), call)
        .await
        .expect("cancelled call should return promptly")
        .unwrap();
    assert!(matches!(result, Err(BridgeError::Cancelled)));
}

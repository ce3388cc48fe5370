//! Integration tests for the polling scheduler.
//!
//! Tests cover:
//! - Immediate first cycle and interval ticking after a failed listing
//! - End-to-end emission of root spans from listed traces
//! - The in-flight cap on concurrent per-trace work
//! - Shutdown waiting for every in-flight per-trace task

use bridge::Poller;
use opentelemetry::trace::noop::NoopTracer;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::common::{
    attribute, in_memory_converter, record, span, unthrottled_source, FakeBackend,
};

#[tokio::test(start_paused = true)]
async fn test_failed_listing_does_not_stop_ticking() {
    let backend = Arc::new(FakeBackend::failing_list());
    let poller = Poller::new(
        Arc::new(unthrottled_source(backend.clone())),
        Arc::new(bridge::SpanConverter::new(NoopTracer::new(), Vec::new())),
        Duration::from_secs(60),
        4,
    );

    // Ticks at 0s and 60s, shutdown at 90s.
    let stats = poller.run(tokio::time::sleep(Duration::from_secs(90))).await;

    assert_eq!(backend.list_calls(), 2);
    assert_eq!(backend.get_calls(), 0);
    assert_eq!(stats.cycles_started, 2);
    assert_eq!(stats.cycles_failed, 2);
    assert_eq!(stats.traces_listed, 0);
}

#[tokio::test]
async fn test_cycle_emits_root_spans() {
    let backend = Arc::new(FakeBackend::with_traces(vec![
        record("abc123", vec![span(42, 0, "handler"), span(43, 42, "db")]),
        record("def456", vec![span(7, 0, "worker")]),
    ]));
    let (converter, exporter) = in_memory_converter();
    let poller = Poller::new(
        Arc::new(unthrottled_source(backend.clone())),
        Arc::new(converter),
        Duration::from_secs(3600),
        4,
    );
    let stats = poller.stats();

    let shutdown = async move {
        while stats.snapshot().spans_emitted < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    let final_stats = tokio::time::timeout(Duration::from_secs(5), poller.run(shutdown))
        .await
        .expect("poller should stop once both spans are emitted");

    assert_eq!(final_stats.cycles_started, 1);
    assert_eq!(final_stats.traces_listed, 2);
    assert_eq!(final_stats.spans_emitted, 2);
    assert_eq!(final_stats.spans_skipped, 0);
    assert_eq!(backend.get_calls(), 2);

    let mut names: Vec<String> = exporter
        .get_finished_spans()
        .unwrap()
        .iter()
        .map(|s| s.name.to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["handler", "worker"]);
}

#[tokio::test]
async fn test_unconvertible_span_is_skipped_not_fatal() {
    let backend = Arc::new(FakeBackend::with_traces(vec![
        record("not-a-hex-id", vec![span(1, 0, "broken")]),
        record("abc123", vec![span(2, 0, "fine")]),
    ]));
    let (converter, exporter) = in_memory_converter();
    let poller = Poller::new(
        Arc::new(unthrottled_source(backend)),
        Arc::new(converter),
        Duration::from_secs(3600),
        4,
    );
    let stats = poller.stats();

    let shutdown = async move {
        loop {
            let snapshot = stats.snapshot();
            if snapshot.spans_emitted + snapshot.spans_skipped >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    let final_stats = tokio::time::timeout(Duration::from_secs(5), poller.run(shutdown))
        .await
        .unwrap();

    assert_eq!(final_stats.spans_emitted, 1);
    assert_eq!(final_stats.spans_skipped, 1);
    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "fine");
    assert_eq!(attribute(&spans[0], "gct.parentSpanId"), None);
}

#[tokio::test]
async fn test_in_flight_cap_bounds_concurrent_fetches() {
    let traces = (1..=6)
        .map(|n| record(&format!("{n:x}"), vec![span(n, 0, "root")]))
        .collect();
    let backend =
        Arc::new(FakeBackend::with_traces(traces).with_get_delay(Duration::from_millis(30)));
    let (converter, _exporter) = in_memory_converter();
    let poller = Poller::new(
        Arc::new(unthrottled_source(backend.clone())),
        Arc::new(converter),
        Duration::from_secs(3600),
        2,
    );
    let stats = poller.stats();

    let shutdown = async move {
        while stats.snapshot().spans_emitted < 6 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poller.run(shutdown))
        .await
        .unwrap();

    assert_eq!(backend.get_calls(), 6);
    assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_tasks() {
    let traces = ["a1", "a2", "a3"]
        .iter()
        .map(|id| record(id, vec![span(1, 0, "slow")]))
        .collect();
    let backend =
        Arc::new(FakeBackend::with_traces(traces).with_get_delay(Duration::from_secs(3600)));
    let poller = Poller::new(
        Arc::new(unthrottled_source(backend.clone())),
        Arc::new(bridge::SpanConverter::new(NoopTracer::new(), Vec::new())),
        Duration::from_secs(3600),
        8,
    );

    let started = backend.clone();
    let shutdown = async move {
        while started.get_calls() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    let stats = tokio::time::timeout(Duration::from_secs(5), poller.run(shutdown))
        .await
        .expect("shutdown should cancel the stalled fetches");

    assert_eq!(backend.get_calls(), 3);
    assert_eq!(backend.get_finished.load(Ordering::SeqCst), 3);
    assert_eq!(stats.traces_failed, 0);
    assert_eq!(stats.spans_emitted, 0);
}

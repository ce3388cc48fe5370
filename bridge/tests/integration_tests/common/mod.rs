//! Common test utilities and helpers for integration tests.
//!
//! This module provides an in-process Cloud Trace fake and helpers to build
//! sources and converters around it.

use bridge::source::CallLimiter;
use bridge::{RateLimitedTraceSource, SpanConverter, TraceBackend};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracer, SdkTracerProvider, SpanData};
use shared::cloudtrace::proto;
use shared::otlp::DEFAULT_SERVICE_NAME_LABELS;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tonic::Status;

/// Scripted stand-in for the Cloud Trace API.
///
/// `ListTraces` answers from a queue of pages, falling back to a fixed
/// answer once the queue is drained. `GetTrace` answers from a map and can
/// be slowed down to keep calls in flight.
#[derive(Default)]
pub struct FakeBackend {
    pages: Mutex<VecDeque<Result<proto::ListTracesResponse, Status>>>,
    fail_list: bool,
    traces: Mutex<HashMap<String, proto::Trace>>,
    get_delay: Option<Duration>,
    /// Number of `ListTraces` calls received.
    pub list_calls: AtomicUsize,
    /// Number of `GetTrace` calls received.
    pub get_calls: AtomicUsize,
    /// `GetTrace` calls whose future has been dropped, completed or not.
    pub get_finished: AtomicUsize,
    in_flight: AtomicUsize,
    /// Highest number of concurrent `GetTrace` calls observed.
    pub max_in_flight: AtomicUsize,
}

impl FakeBackend {
    /// A backend whose every `ListTraces` call fails.
    pub fn failing_list() -> Self {
        Self {
            fail_list: true,
            ..Default::default()
        }
    }

    /// A backend listing `traces` in a single page and serving them on `GetTrace`.
    pub fn with_traces(traces: Vec<proto::Trace>) -> Self {
        let backend = Self::default();
        backend.push_page(traces.clone(), "");
        {
            let mut stored = backend.traces.lock().unwrap();
            for trace in traces {
                stored.insert(trace.trace_id.clone(), trace);
            }
        }
        backend
    }

    /// Makes every `GetTrace` call take `delay`.
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    /// Queues one `ListTraces` page.
    pub fn push_page(&self, traces: Vec<proto::Trace>, next_page_token: &str) {
        self.pages
            .lock()
            .unwrap()
            .push_back(Ok(proto::ListTracesResponse {
                traces,
                next_page_token: next_page_token.to_string(),
            }));
    }

    /// Queues one failing `ListTraces` call.
    pub fn push_list_error(&self, status: Status) {
        self.pages.lock().unwrap().push_back(Err(status));
    }

    /// Number of `ListTraces` calls received.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `GetTrace` calls received.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

/// Records the end of a `GetTrace` call when dropped.
struct CallGuard<'a> {
    backend: &'a FakeBackend,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.backend.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.backend.get_finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl TraceBackend for FakeBackend {
    async fn list_traces(
        &self,
        _request: proto::ListTracesRequest,
    ) -> Result<proto::ListTracesResponse, Status> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(Status::unavailable("list unavailable"));
        }
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(proto::ListTracesResponse::default()))
    }

    async fn get_trace(&self, request: proto::GetTraceRequest) -> Result<proto::Trace, Status> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = CallGuard { backend: self };

        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }

        self.traces
            .lock()
            .unwrap()
            .get(&request.trace_id)
            .cloned()
            .ok_or_else(|| Status::not_found(request.trace_id))
    }
}

/// Builds a backend trace record.
pub fn record(trace_id: &str, spans: Vec<proto::TraceSpan>) -> proto::Trace {
    proto::Trace {
        project_id: "proj-1".to_string(),
        trace_id: trace_id.to_string(),
        spans,
    }
}

/// Builds a backend span record; `parent_span_id == 0` means root.
pub fn span(span_id: u64, parent_span_id: u64, name: &str) -> proto::TraceSpan {
    proto::TraceSpan {
        span_id,
        name: name.to_string(),
        start_time: Some(prost_types::Timestamp {
            seconds: 100,
            nanos: 0,
        }),
        end_time: Some(prost_types::Timestamp {
            seconds: 100,
            nanos: 500_000_000,
        }),
        parent_span_id,
        ..Default::default()
    }
}

/// Builds a source over `backend` with limits high enough not to matter.
pub fn unthrottled_source(backend: Arc<FakeBackend>) -> RateLimitedTraceSource {
    let generous = NonZeroU32::new(10_000).unwrap();
    throttled_source(backend, generous, generous)
}

/// Builds a source over `backend` with the given `GetTrace` rate and burst.
pub fn throttled_source(
    backend: Arc<FakeBackend>,
    get_rate: NonZeroU32,
    get_burst: NonZeroU32,
) -> RateLimitedTraceSource {
    let generous = NonZeroU32::new(10_000).unwrap();
    RateLimitedTraceSource::new(
        backend,
        CallLimiter::new("list", generous, generous),
        CallLimiter::new("get", get_rate, get_burst),
        "proj-1",
        10,
    )
}

/// Builds a converter whose spans land in the returned in-memory exporter.
pub fn in_memory_converter() -> (SpanConverter<SdkTracer>, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let labels = DEFAULT_SERVICE_NAME_LABELS.map(String::from).to_vec();
    (
        SpanConverter::new(provider.tracer(bridge::converter::TRACER_NAME), labels),
        exporter,
    )
}

/// Returns the string value of attribute `key` on `span`.
pub fn attribute(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}

//! Rate-limited access to Cloud Trace.
//!
//! [`RateLimitedTraceSource`] wraps a [`TraceBackend`] behind two independent
//! token buckets, one for `ListTraces` and one for `GetTrace`.
//!
//! Every wait and every backend call observes the shared cancellation token.

mod grpc;
mod limiter;

pub use grpc::CloudTraceClient;
pub use limiter::CallLimiter;

use crate::config::Config;
use crate::error::{BridgeError, Result};
use chrono::{DateTime, Utc};
use shared::cloudtrace::{decode_trace, get_trace_request, list_traces_request, proto};
use shared::models::{Span, Trace};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Width of the trailing window queried by [`RateLimitedTraceSource::list_recent_traces`].
pub const QUERY_WINDOW: Duration = Duration::from_secs(3);

/// The two read-only Cloud Trace operations the bridge depends on.
#[async_trait::async_trait]
pub trait TraceBackend: Send + Sync {
    /// Lists one page of traces.
    async fn list_traces(
        &self,
        request: proto::ListTracesRequest,
    ) -> std::result::Result<proto::ListTracesResponse, Status>;

    /// Gets a single trace with all of its spans.
    async fn get_trace(
        &self,
        request: proto::GetTraceRequest,
    ) -> std::result::Result<proto::Trace, Status>;
}

/// Cloud Trace access under separate list and get rate limits.
pub struct RateLimitedTraceSource {
    backend: Arc<dyn TraceBackend>,
    list_limiter: CallLimiter,
    get_limiter: CallLimiter,
    project_id: String,
    page_size: i32,
}

impl RateLimitedTraceSource {
    /// Creates a source from its parts.
    #[must_use]
    pub fn new(
        backend: Arc<dyn TraceBackend>,
        list_limiter: CallLimiter,
        get_limiter: CallLimiter,
        project_id: impl Into<String>,
        page_size: i32,
    ) -> Self {
        Self {
            backend,
            list_limiter,
            get_limiter,
            project_id: project_id.into(),
            page_size,
        }
    }

    /// Creates a source using the project, page size, and quotas from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured rate or burst is zero.
    pub fn from_config(backend: Arc<dyn TraceBackend>, config: &Config) -> Result<Self> {
        let (list_rate, list_burst) = config.list_traces_quota()?;
        let (get_rate, get_burst) = config.get_trace_quota()?;

        Ok(Self::new(
            backend,
            CallLimiter::new("list", list_rate, list_burst),
            CallLimiter::new("get", get_rate, get_burst),
            config.project_id.clone(),
            config.trace_page_size,
        ))
    }

    /// The project traces are read from.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Lists the traces whose root span fell in the last [`QUERY_WINDOW`].
    ///
    /// # Errors
    ///
    /// See [`RateLimitedTraceSource::list_traces_in_window`].
    pub async fn list_recent_traces(&self, cancel: &CancellationToken) -> Result<Vec<Trace>> {
        let end = Utc::now();
        let window = chrono::Duration::from_std(QUERY_WINDOW).unwrap_or(chrono::Duration::zero());
        self.list_traces_in_window(end - window, end, cancel).await
    }

    /// Lists the traces in `[start, end]` using the root-span view.
    ///
    /// Each page is a separate `ListTraces` call and takes its own permit.
    /// If a page after the first fails, the traces gathered so far are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cancellation fires while waiting for the first permit (`RateLimitExceeded`)
    /// - The first page request fails (`BackendCall`) or is cancelled (`Cancelled`)
    pub async fn list_traces_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Trace>> {
        let started = std::time::Instant::now();
        tracing::info!(project_id = %self.project_id, "Fetching traces");

        let mut traces = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let request =
                list_traces_request(&self.project_id, self.page_size, page_token.take(), start, end);

            let page = async {
                self.list_limiter.acquire(cancel).await?;
                call(cancel, self.backend.list_traces(request)).await
            }
            .await;

            let response = match page {
                Ok(response) => response,
                Err(e) if pages == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        project_id = %self.project_id,
                        pages,
                        fetched = traces.len(),
                        error = %e,
                        "Trace listing stopped early, keeping traces fetched so far"
                    );
                    break;
                }
            };

            pages += 1;
            traces.extend(response.traces.into_iter().map(decode_trace));

            if response.next_page_token.is_empty() {
                break;
            }
            page_token = Some(response.next_page_token);
        }

        tracing::info!(
            project_id = %self.project_id,
            traces = traces.len(),
            pages,
            elapsed = ?started.elapsed(),
            "Fetched traces"
        );
        Ok(traces)
    }

    /// Fetches a trace and returns its root spans.
    ///
    /// An empty list is a valid result.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cancellation fires while waiting for a permit (`RateLimitExceeded`)
    /// - The backend call fails (`BackendCall`) or is cancelled (`Cancelled`)
    pub async fn fetch_root_spans(
        &self,
        trace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Span>> {
        self.get_limiter.acquire(cancel).await?;

        tracing::debug!(trace_id, "Fetching root spans");
        let request = get_trace_request(&self.project_id, trace_id);
        let record = call(cancel, self.backend.get_trace(request)).await?;

        let root_spans = decode_trace(record).into_root_spans();
        tracing::info!(trace_id, root_spans = root_spans.len(), "Fetched root spans");
        Ok(root_spans)
    }
}

impl std::fmt::Debug for RateLimitedTraceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedTraceSource")
            .field("project_id", &self.project_id)
            .field("page_size", &self.page_size)
            .field("list_limiter", &self.list_limiter)
            .field("get_limiter", &self.get_limiter)
            .finish_non_exhaustive()
    }
}

/// Races a backend call against cancellation.
async fn call<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, Status>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(BridgeError::Cancelled),
        result = fut => result.map_err(BridgeError::from),
    }
}

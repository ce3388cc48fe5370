//! Polling scheduler.
//!
//! The [`Poller`] runs one fetch cycle immediately and then one per poll
//! interval. Each cycle lists the recent traces and fans out one task per
//! trace that fetches its root spans and converts them. Cycles may overlap;
//! concurrency across all of them is capped by a shared semaphore.
//!
//! Every task spawned by the poller is tracked, so shutdown can cancel
//! outstanding work and then wait for all of it to finish.

use crate::converter::SpanConverter;
use crate::source::RateLimitedTraceSource;
use opentelemetry::trace::Tracer;
use shared::models::Trace;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Running totals kept by the poller.
#[derive(Debug, Default)]
pub struct PollerStats {
    cycles_started: AtomicU64,
    cycles_failed: AtomicU64,
    traces_listed: AtomicU64,
    traces_failed: AtomicU64,
    spans_emitted: AtomicU64,
    spans_skipped: AtomicU64,
}

impl PollerStats {
    /// Takes a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            traces_listed: self.traces_listed.load(Ordering::Relaxed),
            traces_failed: self.traces_failed.load(Ordering::Relaxed),
            spans_emitted: self.spans_emitted.load(Ordering::Relaxed),
            spans_skipped: self.spans_skipped.load(Ordering::Relaxed),
        }
    }

    fn incr(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Cycles launched.
    pub cycles_started: u64,
    /// Cycles whose trace listing failed.
    pub cycles_failed: u64,
    /// Traces returned by successful listings.
    pub traces_listed: u64,
    /// Traces whose root spans could not be fetched.
    pub traces_failed: u64,
    /// Root spans handed to the exporter.
    pub spans_emitted: u64,
    /// Root spans dropped because they could not be converted.
    pub spans_skipped: u64,
}

/// Drives fetch cycles until shutdown.
pub struct Poller<T> {
    source: Arc<RateLimitedTraceSource>,
    converter: Arc<SpanConverter<T>>,
    poll_interval: Duration,
    in_flight: Arc<Semaphore>,
    stats: Arc<PollerStats>,
}

impl<T> Poller<T>
where
    T: Tracer + Send + Sync + 'static,
{
    /// Creates a poller.
    ///
    /// A zero `poll_interval` falls back to the default interval and a zero
    /// `max_in_flight` is raised to one.
    #[must_use]
    pub fn new(
        source: Arc<RateLimitedTraceSource>,
        converter: Arc<SpanConverter<T>>,
        poll_interval: Duration,
        max_in_flight: usize,
    ) -> Self {
        let poll_interval = if poll_interval.is_zero() {
            crate::config::DEFAULT_POLL_INTERVAL
        } else {
            poll_interval
        };

        Self {
            source,
            converter,
            poll_interval,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
            stats: Arc::new(PollerStats::default()),
        }
    }

    /// Shared handle to the poller's counters.
    #[must_use]
    pub fn stats(&self) -> Arc<PollerStats> {
        Arc::clone(&self.stats)
    }

    /// Runs cycles until `shutdown` completes, then cancels outstanding work
    /// and waits for every cycle and per-trace task to finish.
    ///
    /// Returns the final counter values.
    pub async fn run<F>(&self, shutdown: F) -> StatsSnapshot
    where
        F: Future<Output = ()>,
    {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            project_id = %self.source.project_id(),
            poll_interval = ?self.poll_interval,
            "Poller started"
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    let cycle = Cycle {
                        number: self.stats.cycles_started.fetch_add(1, Ordering::Relaxed) + 1,
                        source: Arc::clone(&self.source),
                        converter: Arc::clone(&self.converter),
                        in_flight: Arc::clone(&self.in_flight),
                        stats: Arc::clone(&self.stats),
                        cancel: cancel.clone(),
                        tracker: tracker.clone(),
                    };
                    tracker.spawn(cycle.run());
                }
            }
        }

        tracing::info!(tasks = tracker.len(), "Poller stopping, waiting for in-flight tasks");
        cancel.cancel();
        tracker.close();
        tracker.wait().await;

        let stats = self.stats.snapshot();
        tracing::info!(
            cycles_started = stats.cycles_started,
            cycles_failed = stats.cycles_failed,
            traces_listed = stats.traces_listed,
            traces_failed = stats.traces_failed,
            spans_emitted = stats.spans_emitted,
            spans_skipped = stats.spans_skipped,
            "Poller stopped"
        );
        stats
    }
}

impl<T> std::fmt::Debug for Poller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("source", &self.source)
            .field("poll_interval", &self.poll_interval)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// One fetch cycle and the per-trace work it launches.
struct Cycle<T> {
    number: u64,
    source: Arc<RateLimitedTraceSource>,
    converter: Arc<SpanConverter<T>>,
    in_flight: Arc<Semaphore>,
    stats: Arc<PollerStats>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl<T> Cycle<T>
where
    T: Tracer + Send + Sync + 'static,
{
    async fn run(self) {
        let started = Instant::now();
        tracing::info!(cycle = self.number, "Poll cycle started");

        let traces = match self.source.list_recent_traces(&self.cancel).await {
            Ok(traces) => traces,
            Err(e) if e.is_cancellation() => {
                tracing::debug!(cycle = self.number, "Poll cycle cancelled");
                return;
            }
            Err(e) => {
                PollerStats::incr(&self.stats.cycles_failed, 1);
                tracing::error!(cycle = self.number, error = %e, "Failed to list traces");
                return;
            }
        };

        let listed = traces.len();
        PollerStats::incr(&self.stats.traces_listed, listed as u64);

        let this = Arc::new(self);
        let mut launched = 0usize;
        for trace in traces {
            let permit = tokio::select! {
                biased;
                () = this.cancel.cancelled() => break,
                permit = Arc::clone(&this.in_flight).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let worker = Arc::clone(&this);
            this.tracker.spawn(async move {
                let _permit = permit;
                worker.process_trace(trace).await;
            });
            launched += 1;
        }

        tracing::info!(
            cycle = this.number,
            traces = listed,
            launched,
            elapsed = ?started.elapsed(),
            "Poll cycle dispatched"
        );
    }

    async fn process_trace(&self, trace: Trace) {
        let root_spans = match self.source.fetch_root_spans(&trace.trace_id, &self.cancel).await {
            Ok(spans) => spans,
            Err(e) if e.is_cancellation() => {
                tracing::debug!(trace_id = %trace.trace_id, "Trace fetch cancelled");
                return;
            }
            Err(e) => {
                PollerStats::incr(&self.stats.traces_failed, 1);
                tracing::error!(trace_id = %trace.trace_id, error = %e, "Failed to fetch root spans");
                return;
            }
        };

        for span in &root_spans {
            match self.converter.convert(&trace, span) {
                Ok(_) => PollerStats::incr(&self.stats.spans_emitted, 1),
                Err(e) => {
                    PollerStats::incr(&self.stats.spans_skipped, 1);
                    tracing::warn!(
                        trace_id = %trace.trace_id,
                        span_id = span.span_id,
                        error = %e,
                        "Skipping span"
                    );
                }
            }
        }
    }
}

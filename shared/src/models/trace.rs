//! Trace and span data models.
//!
//! Defines the source-format structures decoded from Cloud Trace. They are
//! plain values: created while decoding a backend record, read during
//! conversion, and dropped at the end of the poll cycle that fetched them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// A point in time as seconds since the Unix epoch plus a sub-second remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TimeStamp {
    /// Whole seconds since the Unix epoch.
    pub seconds: i64,
    /// Nanoseconds past `seconds`.
    pub nanos: i32,
}

impl TimeStamp {
    /// Creates a new timestamp.
    #[must_use]
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Returns the timestamp as total nanoseconds since the epoch.
    #[must_use]
    pub fn as_nanos(&self) -> i128 {
        i128::from(self.seconds) * NANOS_PER_SECOND + i128::from(self.nanos)
    }

    /// Converts the timestamp to a `SystemTime`.
    ///
    /// Out-of-range nanoseconds are normalised into the seconds part.
    /// Returns `None` if the instant cannot be represented on this platform.
    #[must_use]
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let total = self.as_nanos();
        let magnitude = total.unsigned_abs();
        let secs = u64::try_from(magnitude / NANOS_PER_SECOND.unsigned_abs()).ok()?;
        let nanos = u32::try_from(magnitude % NANOS_PER_SECOND.unsigned_abs()).ok()?;
        let offset = Duration::new(secs, nanos);

        if total >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        }
    }

    /// Converts the timestamp to a `DateTime<Utc>` for display.
    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let total = self.as_nanos();
        let secs = i64::try_from(total.div_euclid(NANOS_PER_SECOND)).ok()?;
        let nanos = u32::try_from(total.rem_euclid(NANOS_PER_SECOND)).ok()?;
        DateTime::from_timestamp(secs, nanos)
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self {
            seconds: value.timestamp(),
            // Always below 2_000_000_000 (leap second representation).
            nanos: i32::try_from(value.timestamp_subsec_nanos()).unwrap_or(i32::MAX),
        }
    }
}

/// A span representing one timed unit of work in a Cloud Trace trace.
///
/// # Example
///
/// ```
/// use shared::models::{Span, TimeStamp};
///
/// let span = Span::new(42, "handler")
///     .with_start_time(TimeStamp::new(100, 0))
///     .with_end_time(TimeStamp::new(100, 500_000_000))
///     .with_label("service.name", "checkout");
///
/// assert!(span.is_root());
/// assert_eq!(span.labels.get("service.name").map(String::as_str), Some("checkout"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Backend-assigned span identifier, unique only within its trace.
    pub span_id: u64,

    /// The name/operation of this span.
    pub name: String,

    /// When the span started.
    pub start_time: TimeStamp,

    /// When the span ended. Not required to be after `start_time`.
    pub end_time: TimeStamp,

    /// The parent span ID (None for root spans).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<u64>,

    /// Backend labels attached to the span.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Span {
    /// Creates a new root span with zeroed timestamps and no labels.
    #[must_use]
    pub fn new(span_id: u64, name: impl Into<String>) -> Self {
        Self {
            span_id,
            name: name.into(),
            start_time: TimeStamp::default(),
            end_time: TimeStamp::default(),
            parent_span_id: None,
            labels: HashMap::new(),
        }
    }

    /// Sets the parent span ID.
    #[must_use]
    pub fn with_parent(mut self, parent_span_id: u64) -> Self {
        self.parent_span_id = Some(parent_span_id);
        self
    }

    /// Sets the start time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: TimeStamp) -> Self {
        self.start_time = start_time;
        self
    }

    /// Sets the end time.
    #[must_use]
    pub fn with_end_time(mut self, end_time: TimeStamp) -> Self {
        self.end_time = end_time;
        self
    }

    /// Adds a label to the span.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Returns true if this is a root span (no parent).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Returns the span duration in nanoseconds, negative if the end precedes the start.
    #[must_use]
    pub fn duration_nanos(&self) -> i128 {
        self.end_time.as_nanos() - self.start_time.as_nanos()
    }
}

/// A trace: the spans recorded under one trace identifier in one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// The project the trace was recorded in.
    pub project_id: String,

    /// Backend trace identifier (hex encoded).
    pub trace_id: String,

    /// Spans in this trace. They carry no trace ID of their own.
    #[serde(default)]
    pub spans: Vec<Span>,
}

impl Trace {
    /// Creates an empty trace.
    #[must_use]
    pub fn new(project_id: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            trace_id: trace_id.into(),
            spans: Vec::new(),
        }
    }

    /// Sets the spans of this trace.
    #[must_use]
    pub fn with_spans(mut self, spans: Vec<Span>) -> Self {
        self.spans = spans;
        self
    }

    /// Returns the spans without a parent.
    pub fn root_spans(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|span| span.is_root())
    }

    /// Consumes the trace, keeping only its root spans.
    #[must_use]
    pub fn into_root_spans(self) -> Vec<Span> {
        self.spans.into_iter().filter(Span::is_root).collect()
    }

    /// Returns the number of spans in this trace.
    #[must_use]
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }
}

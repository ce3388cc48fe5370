//! Conversions between Cloud Trace protobuf records and internal trace models.
//!
//! Cloud Trace uses `0` as the "no parent" marker for `parent_span_id`, since
//! `0` is never a valid span identifier in its ID space. Decoding turns that
//! sentinel into an absent parent.

use crate::cloudtrace::proto;
use crate::models::{Span, TimeStamp, Trace};
use chrono::{DateTime, Utc};

/// Converts an optional protobuf timestamp into a `TimeStamp`.
///
/// A missing timestamp decodes to the Unix epoch.
#[must_use]
pub fn decode_timestamp(timestamp: Option<&prost_types::Timestamp>) -> TimeStamp {
    timestamp
        .map(|ts| TimeStamp::new(ts.seconds, ts.nanos))
        .unwrap_or_default()
}

/// Converts a `DateTime<Utc>` into a protobuf timestamp for request windows.
#[must_use]
pub fn encode_timestamp(datetime: DateTime<Utc>) -> prost_types::Timestamp {
    let ts = TimeStamp::from(datetime);
    prost_types::Timestamp {
        seconds: ts.seconds,
        nanos: ts.nanos,
    }
}

/// Converts a Cloud Trace span record into a `Span`.
#[must_use]
pub fn decode_span(record: proto::TraceSpan) -> Span {
    let parent_span_id = match record.parent_span_id {
        0 => None,
        parent => Some(parent),
    };

    Span {
        span_id: record.span_id,
        name: record.name,
        start_time: decode_timestamp(record.start_time.as_ref()),
        end_time: decode_timestamp(record.end_time.as_ref()),
        parent_span_id,
        labels: record.labels,
    }
}

/// Converts a list of Cloud Trace span records.
#[must_use]
pub fn decode_spans(records: Vec<proto::TraceSpan>) -> Vec<Span> {
    records.into_iter().map(decode_span).collect()
}

/// Converts a Cloud Trace trace record into a `Trace`.
#[must_use]
pub fn decode_trace(record: proto::Trace) -> Trace {
    Trace {
        project_id: record.project_id,
        trace_id: record.trace_id,
        spans: decode_spans(record.spans),
    }
}

/// Builds a root-span `ListTraces` request for `[start, end]`.
#[must_use]
pub fn list_traces_request(
    project_id: &str,
    page_size: i32,
    page_token: Option<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> proto::ListTracesRequest {
    proto::ListTracesRequest {
        project_id: project_id.to_string(),
        view: proto::list_traces_request::ViewType::Rootspan as i32,
        page_size,
        page_token: page_token.unwrap_or_default(),
        start_time: Some(encode_timestamp(start)),
        end_time: Some(encode_timestamp(end)),
        ..Default::default()
    }
}

/// Builds a `GetTrace` request.
#[must_use]
pub fn get_trace_request(project_id: &str, trace_id: &str) -> proto::GetTraceRequest {
    proto::GetTraceRequest {
        project_id: project_id.to_string(),
        trace_id: trace_id.to_string(),
    }
}

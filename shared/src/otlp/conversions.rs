//! Conversions from Cloud Trace identifiers and labels to OpenTelemetry ones.
//!
//! Cloud Trace identifies spans with a 64-bit integer and traces with a hex
//! string, while OpenTelemetry uses fixed-width byte strings for both. The
//! functions here translate between the two bit-exactly so spans can be
//! correlated across systems.

use opentelemetry::trace::{SpanId, TraceId};
use std::collections::HashMap;
use thiserror::Error;

/// Number of hex digits in an OpenTelemetry trace ID.
pub const TRACE_ID_HEX_LEN: usize = 32;

/// Attribute carrying the Cloud Trace parent span ID (decimal).
pub const PARENT_SPAN_ID_ATTRIBUTE: &str = "gct.parentSpanId";

/// Attribute receiving the derived service name.
pub const SERVICE_NAME_ATTRIBUTE: &str = "service.name";

/// Label keys checked, in order, when deriving the service name.
pub const DEFAULT_SERVICE_NAME_LABELS: [&str; 3] = [
    "service.name",
    "g.co/gae/app/module",
    "g.co/r/generic_task/job",
];

/// Errors that can occur while re-encoding identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The trace ID is empty, longer than 32 digits, or not hex.
    #[error("Invalid trace ID {0:?}: expected 1 to 32 hex digits")]
    InvalidTraceIdHex(String),

    /// The trace ID decodes to all zeros.
    #[error("Trace ID {0:?} decodes to the invalid all-zero trace ID")]
    ZeroTraceId(String),

    /// The span ID hex string is malformed.
    #[error("Invalid span ID {0:?}: expected 16 hex digits")]
    InvalidSpanIdHex(String),

    /// The span ID is zero, which OpenTelemetry treats as invalid.
    #[error("Span ID 0 is not a valid span ID")]
    ZeroSpanId,
}

/// Formats a Cloud Trace span ID as 16 zero-padded lowercase hex digits.
///
/// # Examples
///
/// ```
/// use shared::otlp::conversions::span_id_to_hex;
///
/// assert_eq!(span_id_to_hex(42), "000000000000002a");
/// ```
#[must_use]
pub fn span_id_to_hex(span_id: u64) -> String {
    format!("{span_id:016x}")
}

/// Parses 16 hex digits back into a Cloud Trace span ID.
///
/// # Errors
///
/// Returns an error if `encoded` is not exactly 16 hex digits.
pub fn span_id_from_hex(encoded: &str) -> Result<u64, IdError> {
    decode_fixed::<8>(encoded)
        .map(u64::from_be_bytes)
        .ok_or_else(|| IdError::InvalidSpanIdHex(encoded.to_string()))
}

/// Re-encodes a Cloud Trace span ID as an OpenTelemetry `SpanId`.
///
/// The ID goes through its 16-digit hex form so the byte layout matches
/// what other OpenTelemetry tooling produces for the same number.
///
/// # Errors
///
/// Returns an error if the span ID is zero.
pub fn to_otel_span_id(span_id: u64) -> Result<SpanId, IdError> {
    let encoded = span_id_to_hex(span_id);
    let bytes = decode_fixed::<8>(&encoded).ok_or(IdError::InvalidSpanIdHex(encoded))?;
    let id = SpanId::from_bytes(bytes);
    if id == SpanId::INVALID {
        return Err(IdError::ZeroSpanId);
    }
    Ok(id)
}

/// Re-encodes a Cloud Trace trace ID as an OpenTelemetry `TraceId`.
///
/// Cloud Trace IDs are normally 32 hex digits. Shorter IDs are left-padded
/// with zeros, the same way span IDs are padded.
///
/// # Errors
///
/// Returns an error if the ID is empty, longer than 32 digits, not hex,
/// or all zeros.
pub fn to_otel_trace_id(trace_id: &str) -> Result<TraceId, IdError> {
    if trace_id.is_empty()
        || trace_id.len() > TRACE_ID_HEX_LEN
        || !trace_id.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(IdError::InvalidTraceIdHex(trace_id.to_string()));
    }

    let padded = format!("{trace_id:0>TRACE_ID_HEX_LEN$}");
    let bytes = decode_fixed::<16>(&padded)
        .ok_or_else(|| IdError::InvalidTraceIdHex(trace_id.to_string()))?;
    let id = TraceId::from_bytes(bytes);
    if id == TraceId::INVALID {
        return Err(IdError::ZeroTraceId(trace_id.to_string()));
    }
    Ok(id)
}

/// Returns the value of the first candidate label present on a span.
///
/// # Examples
///
/// ```
/// use shared::otlp::conversions::resolve_service_name;
/// use std::collections::HashMap;
///
/// let labels = HashMap::from([("g.co/gae/app/module".to_string(), "billing".to_string())]);
/// let candidates = ["service.name", "g.co/gae/app/module"];
///
/// assert_eq!(resolve_service_name(&labels, &candidates), Some("billing"));
/// ```
#[must_use]
pub fn resolve_service_name<'a, K>(
    labels: &'a HashMap<String, String>,
    candidates: &[K],
) -> Option<&'a str>
where
    K: AsRef<str>,
{
    candidates
        .iter()
        .find_map(|key| labels.get(key.as_ref()))
        .map(String::as_str)
}

/// Decodes exactly `2 * N` hex digits into `N` bytes.
fn decode_fixed<const N: usize>(hex_str: &str) -> Option<[u8; N]> {
    if hex_str.len() != N * 2 {
        return None;
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(hex_str, &mut bytes).ok()?;
    Some(bytes)
}

#[cfg(test)]
#[path = "conversions_test.rs"]
mod conversions_test;

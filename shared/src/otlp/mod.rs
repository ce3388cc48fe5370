//! OpenTelemetry Protocol (OTLP) support.
//!
//! This module provides the identifier and label conversions needed to re-emit
//! Cloud Trace spans as OpenTelemetry spans.
//!
//! # Example
//!
//! ```
//! use shared::otlp::conversions::{span_id_to_hex, to_otel_span_id};
//!
//! let id = to_otel_span_id(42).unwrap();
//! assert_eq!(id.to_string(), span_id_to_hex(42));
//! ```

pub mod conversions;

pub use conversions::{
    resolve_service_name, span_id_from_hex, span_id_to_hex, to_otel_span_id, to_otel_trace_id,
    IdError, DEFAULT_SERVICE_NAME_LABELS, PARENT_SPAN_ID_ATTRIBUTE, SERVICE_NAME_ATTRIBUTE,
};

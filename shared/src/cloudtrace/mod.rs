//! Google Cloud Trace (v1) support.
//!
//! This module provides the protobuf types of the Cloud Trace v1 API and the
//! decoding of its records into the internal trace models.
//!
//! # Example
//!
//! ```
//! use shared::cloudtrace::{decode_span, proto};
//!
//! let record = proto::TraceSpan {
//!     span_id: 42,
//!     name: "handler".to_string(),
//!     parent_span_id: 0,
//!     ..Default::default()
//! };
//!
//! assert!(decode_span(record).is_root());
//! ```

pub mod conversions;

pub use conversions::{
    decode_span, decode_spans, decode_timestamp, decode_trace, encode_timestamp,
    get_trace_request, list_traces_request,
};

/// Fully qualified gRPC service name of the Cloud Trace v1 API.
pub const TRACE_SERVICE: &str = "google.devtools.cloudtrace.v1.TraceService";

/// gRPC path of the `ListTraces` method.
pub const LIST_TRACES_PATH: &str = "/google.devtools.cloudtrace.v1.TraceService/ListTraces";

/// gRPC path of the `GetTrace` method.
pub const GET_TRACE_PATH: &str = "/google.devtools.cloudtrace.v1.TraceService/GetTrace";

/// Default public endpoint of the Cloud Trace API.
pub const DEFAULT_ENDPOINT: &str = "https://cloudtrace.googleapis.com";

// Checked-in prost output for google/devtools/cloudtrace/v1/trace.proto.
#[allow(clippy::all)]
#[allow(clippy::pedantic)]
#[allow(missing_docs)]
pub mod proto {
    //! Generated protobuf types from the Cloud Trace v1 definitions.
    include!("google.devtools.cloudtrace.v1.rs");
}

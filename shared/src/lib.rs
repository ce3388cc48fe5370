//! cloudtrace-otel Shared Library
//!
//! This crate contains the types and conversions used across the
//! cloudtrace-otel bridge and its command-line tool.
//!
//! # Modules
//!
//! - [`models`] - Source-format trace, span, and timestamp models
//! - [`cloudtrace`] - Cloud Trace v1 protobuf types and record decoding
//! - [`otlp`] - Identifier and label conversions towards OpenTelemetry
//!
//! # Example
//!
//! ```
//! use shared::models::{Span, TimeStamp, Trace};
//! use shared::otlp::conversions::to_otel_trace_id;
//!
//! let trace = Trace::new("proj-1", "382d4f4c6b7bb2f4a972559d9085001d")
//!     .with_spans(vec![Span::new(42, "handler").with_start_time(TimeStamp::new(100, 0))]);
//!
//! assert_eq!(trace.root_spans().count(), 1);
//! assert!(to_otel_trace_id(&trace.trace_id).is_ok());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cloudtrace;
pub mod models;
pub mod otlp;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use prost_types;

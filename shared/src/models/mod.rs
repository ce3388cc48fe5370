//! Data models for Cloud Trace traces.
//!
//! This module contains the source-format structures every other component works with.

pub mod trace;

pub use trace::{Span, TimeStamp, Trace};

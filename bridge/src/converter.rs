//! Re-emission of Cloud Trace root spans as OpenTelemetry spans.

use crate::error::{BridgeError, Result};
use opentelemetry::trace::{Span as _, SpanContext, TraceFlags, TraceState, Tracer};
use opentelemetry::{Context, KeyValue};
use shared::models::{Span, TimeStamp, Trace};
use shared::otlp::{
    resolve_service_name, to_otel_span_id, to_otel_trace_id, PARENT_SPAN_ID_ATTRIBUTE,
    SERVICE_NAME_ATTRIBUTE,
};
use std::time::SystemTime;

/// Instrumentation scope name of the emitted spans.
pub const TRACER_NAME: &str = "gcp-cloud-trace-converter";

/// Turns (trace, root span) pairs into finished OpenTelemetry spans.
///
/// The emitted span keeps the Cloud Trace identity (trace ID and span ID,
/// re-encoded) and its historical start and end instants. A parent, if any,
/// is recorded as the `gct.parentSpanId` attribute rather than as a link.
#[derive(Debug)]
pub struct SpanConverter<T> {
    tracer: T,
    service_name_labels: Vec<String>,
}

impl<T: Tracer> SpanConverter<T> {
    /// Creates a converter emitting through `tracer`, deriving `service.name`
    /// from the first of `service_name_labels` present on a span.
    pub fn new(tracer: T, service_name_labels: Vec<String>) -> Self {
        Self {
            tracer,
            service_name_labels,
        }
    }

    /// Emits `span` as a finished span and returns the identity it was given.
    ///
    /// Nothing is emitted on error.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The trace ID or span ID cannot be re-encoded (`IdentifierDecode`)
    /// - A timestamp is not representable (`TimestampOutOfRange`)
    pub fn convert(&self, trace: &Trace, span: &Span) -> Result<SpanContext> {
        tracing::debug!(
            trace_id = %trace.trace_id,
            span_id = span.span_id,
            name = %span.name,
            "Converting span"
        );

        let trace_id = to_otel_trace_id(&trace.trace_id)?;
        let span_id = to_otel_span_id(span.span_id)?;
        let start = system_time(span.start_time)?;
        let end = system_time(span.end_time)?;

        let mut attributes = Vec::with_capacity(2);
        if let Some(parent) = span.parent_span_id {
            attributes.push(KeyValue::new(PARENT_SPAN_ID_ATTRIBUTE, parent.to_string()));
        }
        if let Some(service) = resolve_service_name(&span.labels, &self.service_name_labels) {
            attributes.push(KeyValue::new(SERVICE_NAME_ATTRIBUTE, service.to_string()));
        }

        let context = SpanContext::new(
            trace_id,
            span_id,
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );

        let mut emitted = self
            .tracer
            .span_builder(span.name.clone())
            .with_trace_id(trace_id)
            .with_span_id(span_id)
            .with_start_time(start)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &Context::new());
        emitted.end_with_timestamp(end);

        tracing::debug!(
            trace_id = %trace_id,
            span_id = %span_id,
            "Converted span"
        );
        Ok(context)
    }
}

fn system_time(timestamp: TimeStamp) -> Result<SystemTime> {
    timestamp
        .to_system_time()
        .ok_or(BridgeError::TimestampOutOfRange {
            seconds: timestamp.seconds,
            nanos: timestamp.nanos,
        })
}

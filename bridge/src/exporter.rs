//! OTLP export pipeline for converted spans.

use crate::error::{BridgeError, Result};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tonic::transport::ClientTlsConfig;

/// Value of the `agent.name` resource attribute.
pub const AGENT_NAME: &str = "gcp-cloud-trace-otel";

/// Returns true if the collector at `endpoint` should be reached over TLS.
///
/// TLS is used for `https://` URLs and for any endpoint on port 443.
#[must_use]
pub fn is_secure(endpoint: &str) -> bool {
    endpoint.starts_with("https://") || endpoint.trim_end_matches('/').ends_with(":443")
}

/// Turns a configured endpoint into a URL the gRPC exporter accepts.
///
/// Bare `host:port` endpoints get `https://` when [`is_secure`], `http://` otherwise.
#[must_use]
pub fn endpoint_uri(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else if is_secure(endpoint) {
        format!("https://{endpoint}")
    } else {
        format!("http://{endpoint}")
    }
}

/// Builds the tracer provider exporting spans to `endpoint` in batches.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns `BridgeError::Exporter` if the exporter cannot be built.
pub fn init_tracer_provider(endpoint: &str) -> Result<SdkTracerProvider> {
    let uri = endpoint_uri(endpoint);
    let secure = is_secure(endpoint);

    let builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(uri.clone());
    let builder = if secure {
        builder.with_tls_config(ClientTlsConfig::new().with_native_roots())
    } else {
        builder
    };
    let exporter = builder
        .build()
        .map_err(|e| BridgeError::Exporter(e.to_string()))?;

    let resource = Resource::builder()
        .with_attributes([KeyValue::new("agent.name", AGENT_NAME)])
        .build();

    tracing::info!(endpoint = %uri, secure, "OTLP exporter initialised");

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Flushes pending spans and shuts the provider down, logging any failure.
pub fn shutdown_tracer_provider(provider: &SdkTracerProvider) {
    if let Err(e) = provider.force_flush() {
        tracing::warn!(error = %e, "Failed to flush spans");
    }
    match provider.shutdown() {
        Ok(()) => tracing::info!("OTLP exporter shut down"),
        Err(e) => tracing::error!(error = %e, "Failed to shut down OTLP exporter"),
    }
}

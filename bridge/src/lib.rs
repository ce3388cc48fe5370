//! cloudtrace-otel Bridge
//!
//! This crate polls Google Cloud Trace for recently completed traces and
//! re-emits their root spans to an OpenTelemetry collector over OTLP/gRPC.
//!
//! # Architecture
//!
//! The bridge is built on Tokio and is made of three parts:
//! - [`source`]: rate-limited `ListTraces` / `GetTrace` access to Cloud Trace
//! - [`converter`]: maps a Cloud Trace root span to an OpenTelemetry span
//! - [`scheduler`]: periodic fetch cycles with bounded fan-out and graceful shutdown
//!
//! Delivery is at-least-once: a trace seen by several cycles is emitted
//! several times, with identical trace and span IDs.
//!
//! # Example
//!
//! ```no_run
//! use bridge::run_bridge;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_bridge().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod converter;
pub mod error;
pub mod exporter;
pub mod scheduler;
pub mod source;

pub use config::Config;
pub use converter::SpanConverter;
pub use error::BridgeError;
pub use scheduler::{Poller, StatsSnapshot};
pub use source::{CloudTraceClient, RateLimitedTraceSource, TraceBackend};

use opentelemetry::trace::TracerProvider as _;
use std::sync::Arc;

/// Runs the bridge.
///
/// Loads configuration from environment variables and polls until SIGTERM
/// or SIGINT, then waits for in-flight work and flushes the exporter.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The Cloud Trace client cannot be created
/// - The OTLP exporter cannot be created
pub async fn run_bridge() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    run_bridge_with_config(config).await
}

/// Runs the bridge with the provided configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The Cloud Trace client cannot be created
/// - The OTLP exporter cannot be created
pub async fn run_bridge_with_config(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        project_id = %config.project_id,
        cloud_trace_endpoint = %config.cloud_trace_endpoint,
        otlp_endpoint = %config.otlp_endpoint,
        "cloudtrace-otel bridge starting"
    );

    let backend = CloudTraceClient::connect(
        &config.cloud_trace_endpoint,
        config.access_token.as_deref(),
    )
    .await?;
    let source = RateLimitedTraceSource::from_config(Arc::new(backend), &config)?;

    let provider = exporter::init_tracer_provider(&config.otlp_endpoint)?;
    let converter = SpanConverter::new(
        provider.tracer(converter::TRACER_NAME),
        config.service_name_labels.clone(),
    );

    let poller = Poller::new(
        Arc::new(source),
        Arc::new(converter),
        config.poll_interval,
        config.max_in_flight_traces,
    );
    poller.run(shutdown_signal()).await;

    exporter::shutdown_tracer_provider(&provider);
    tracing::info!("Bridge shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
///
/// A signal whose handler cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

//! cloudtrace-otel CLI
//!
//! Command-line tool for inspecting what the bridge would read from Cloud Trace.
//!
//! # Usage
//!
//! ```bash
//! cloudtrace-otel --help
//! cloudtrace-otel --project-id my-project traces --window-secs 60
//! cloudtrace-otel --project-id my-project root-spans 382d4f4c6b7bb2f4a972559d9085001d
//! cloudtrace-otel span-id 42
//! ```

#![deny(unsafe_code)]

use anyhow::Context as _;
use bridge::{CloudTraceClient, Config, RateLimitedTraceSource};
use clap::{Parser, Subcommand};
use shared::chrono::{Duration, Utc};
use shared::cloudtrace::DEFAULT_ENDPOINT;
use shared::otlp::to_otel_span_id;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// cloudtrace-otel CLI - Cloud Trace inspection command-line interface
#[derive(Parser)]
#[command(name = "cloudtrace-otel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cloud project to read traces from
    #[arg(short, long, env = "PROJECT_ID")]
    project_id: Option<String>,

    /// Cloud Trace gRPC endpoint
    #[arg(long, env = "CLOUD_TRACE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// OAuth access token sent as a bearer token
    #[arg(long, env = "CLOUD_TRACE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Page size for trace listings
    #[arg(long, env = "TRACE_PAGE_SIZE", default_value_t = 100)]
    page_size: i32,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the traces of a recent window as JSON
    Traces {
        /// Width of the window ending now, in seconds
        #[arg(long, default_value_t = 3)]
        window_secs: u32,
    },
    /// Print the root spans of one trace as JSON
    RootSpans {
        /// Cloud Trace trace ID (hex)
        trace_id: String,
    },
    /// Print the OpenTelemetry span ID for a Cloud Trace span ID
    SpanId {
        /// Numeric Cloud Trace span ID
        span_id: u64,
    },
}

impl Cli {
    async fn source(&self) -> anyhow::Result<RateLimitedTraceSource> {
        let project_id = self
            .project_id
            .clone()
            .context("--project-id (or PROJECT_ID) is required for this command")?;

        let mut config = Config::new(project_id);
        config.cloud_trace_endpoint.clone_from(&self.endpoint);
        config.access_token.clone_from(&self.access_token);
        config.trace_page_size = self.page_size;

        let backend =
            CloudTraceClient::connect(&config.cloud_trace_endpoint, config.access_token.as_deref())
                .await?;
        Ok(RateLimitedTraceSource::from_config(Arc::new(backend), &config)?)
    }
}

/// Cancels `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    match &cli.command {
        Some(Commands::Traces { window_secs }) => {
            let source = cli.source().await?;
            let end = Utc::now();
            let start = end - Duration::seconds(i64::from(*window_secs));
            let traces = source.list_traces_in_window(start, end, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&traces)?);
        }
        Some(Commands::RootSpans { trace_id }) => {
            let source = cli.source().await?;
            let spans = source.fetch_root_spans(trace_id, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&spans)?);
        }
        Some(Commands::SpanId { span_id }) => {
            println!("{}", to_otel_span_id(*span_id)?);
        }
        None => {
            println!("cloudtrace-otel CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

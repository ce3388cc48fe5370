//! Bridge configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use crate::error::{BridgeError, Result};
use shared::cloudtrace::DEFAULT_ENDPOINT;
use shared::otlp::DEFAULT_SERVICE_NAME_LABELS;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Poll interval used when `POLL_INTERVAL_SECONDS` is unset or zero.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default collector address.
pub const DEFAULT_OTLP_ENDPOINT: &str = "localhost:4317";

/// Default cap on concurrently processed traces.
pub const DEFAULT_MAX_IN_FLIGHT_TRACES: usize = 16;

/// Bridge configuration.
///
/// Configuration values can be set via environment variables:
/// - `PROJECT_ID`: Cloud project to poll (required)
/// - `POLL_INTERVAL_SECONDS`: Seconds between poll cycles (default: 60, `0` means default)
/// - `LIST_TRACES_RATE_LIMIT` / `LIST_TRACES_BURST`: `ListTraces` calls per second and
///   bucket size (default: 1, burst defaults to the rate)
/// - `GET_TRACE_RATE_LIMIT` / `GET_TRACE_BURST`: `GetTrace` calls per second and bucket
///   size (default: 1, burst defaults to the rate)
/// - `TRACE_PAGE_SIZE`: Page size for `ListTraces` (default: 1)
/// - `MAX_IN_FLIGHT_TRACES`: Traces processed concurrently (default: 16)
/// - `CLOUD_TRACE_ENDPOINT`: Cloud Trace gRPC endpoint (default: `https://cloudtrace.googleapis.com`)
/// - `CLOUD_TRACE_ACCESS_TOKEN`: OAuth access token sent as a bearer token (optional)
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector address (default: "localhost:4317")
/// - `SERVICE_NAME_LABELS`: Comma-separated label keys used to derive `service.name`
#[derive(Debug, Clone, Validate)]
pub struct Config {
    /// The Cloud project traces are read from.
    #[validate(length(min = 1, message = "PROJECT_ID is required"))]
    pub project_id: String,
    /// Time between poll cycles.
    pub poll_interval: Duration,
    /// Sustained `ListTraces` calls per second.
    #[validate(range(min = 1, message = "LIST_TRACES_RATE_LIMIT must be at least 1"))]
    pub list_traces_rate_limit: u32,
    /// `ListTraces` token bucket capacity.
    #[validate(range(min = 1, message = "LIST_TRACES_BURST must be at least 1"))]
    pub list_traces_burst: u32,
    /// Sustained `GetTrace` calls per second.
    #[validate(range(min = 1, message = "GET_TRACE_RATE_LIMIT must be at least 1"))]
    pub get_trace_rate_limit: u32,
    /// `GetTrace` token bucket capacity.
    #[validate(range(min = 1, message = "GET_TRACE_BURST must be at least 1"))]
    pub get_trace_burst: u32,
    /// Page size requested from `ListTraces`.
    #[validate(range(min = 1, message = "TRACE_PAGE_SIZE must be at least 1"))]
    pub trace_page_size: i32,
    /// Maximum number of traces processed concurrently.
    #[validate(range(min = 1, message = "MAX_IN_FLIGHT_TRACES must be at least 1"))]
    pub max_in_flight_traces: usize,
    /// Cloud Trace gRPC endpoint.
    #[validate(length(min = 1, message = "CLOUD_TRACE_ENDPOINT cannot be empty"))]
    pub cloud_trace_endpoint: String,
    /// Bearer token for Cloud Trace calls.
    pub access_token: Option<String>,
    /// Collector address for the OTLP exporter.
    #[validate(length(min = 1, message = "OTEL_EXPORTER_OTLP_ENDPOINT cannot be empty"))]
    pub otlp_endpoint: String,
    /// Label keys checked in order when deriving `service.name`.
    pub service_name_labels: Vec<String>,
}

impl Config {
    /// Creates a configuration for `project_id` with every other value at its default.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            list_traces_rate_limit: 1,
            list_traces_burst: 1,
            get_trace_rate_limit: 1,
            get_trace_burst: 1,
            trace_page_size: 1,
            max_in_flight_traces: DEFAULT_MAX_IN_FLIGHT_TRACES,
            cloud_trace_endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name_labels: DEFAULT_SERVICE_NAME_LABELS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `PROJECT_ID` is not set
    /// - A numeric variable is set but cannot be parsed
    /// - A rate, burst, page size, or in-flight cap is zero
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a new configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let project_id = get("PROJECT_ID").ok_or_else(|| {
            BridgeError::Config(
                "variable PROJECT_ID is not set. It is a mandatory configuration".to_string(),
            )
        })?;

        let mut config = Self::new(project_id);

        let poll_secs: u64 = parse_var(&get, "POLL_INTERVAL_SECONDS", 0)?;
        if poll_secs > 0 {
            config.poll_interval = Duration::from_secs(poll_secs);
        }

        config.list_traces_rate_limit = parse_var(&get, "LIST_TRACES_RATE_LIMIT", 1)?;
        config.list_traces_burst =
            parse_var(&get, "LIST_TRACES_BURST", config.list_traces_rate_limit)?;
        config.get_trace_rate_limit = parse_var(&get, "GET_TRACE_RATE_LIMIT", 1)?;
        config.get_trace_burst = parse_var(&get, "GET_TRACE_BURST", config.get_trace_rate_limit)?;
        config.trace_page_size = parse_var(&get, "TRACE_PAGE_SIZE", 1)?;
        config.max_in_flight_traces =
            parse_var(&get, "MAX_IN_FLIGHT_TRACES", DEFAULT_MAX_IN_FLIGHT_TRACES)?;

        if let Some(endpoint) = get("CLOUD_TRACE_ENDPOINT") {
            config.cloud_trace_endpoint = endpoint;
        }
        config.access_token = get("CLOUD_TRACE_ACCESS_TOKEN");
        if let Some(endpoint) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.otlp_endpoint = endpoint;
        }
        if let Some(labels) = get("SERVICE_NAME_LABELS") {
            config.service_name_labels = labels
                .split(',')
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Returns the `ListTraces` rate and burst as non-zero values.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is zero.
    pub fn list_traces_quota(&self) -> Result<(NonZeroU32, NonZeroU32)> {
        quota(
            "LIST_TRACES",
            self.list_traces_rate_limit,
            self.list_traces_burst,
        )
    }

    /// Returns the `GetTrace` rate and burst as non-zero values.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is zero.
    pub fn get_trace_quota(&self) -> Result<(NonZeroU32, NonZeroU32)> {
        quota("GET_TRACE", self.get_trace_rate_limit, self.get_trace_burst)
    }
}

fn parse_var<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| BridgeError::Config(format!("Invalid {key} value {raw:?}: {e}"))),
        None => Ok(default),
    }
}

fn quota(name: &str, rate: u32, burst: u32) -> Result<(NonZeroU32, NonZeroU32)> {
    let rate = NonZeroU32::new(rate)
        .ok_or_else(|| BridgeError::Config(format!("{name} rate limit must be at least 1")))?;
    let burst = NonZeroU32::new(burst)
        .ok_or_else(|| BridgeError::Config(format!("{name} burst must be at least 1")))?;
    Ok((rate, burst))
}

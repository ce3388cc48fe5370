//! Error types for the bridge.

use shared::otlp::IdError;
use thiserror::Error;

/// Unified error type for the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration error, fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The Cloud Trace client could not be created, fatal at startup.
    #[error("Failed to initialise Cloud Trace client: {0}")]
    BackendInit(String),

    /// The OTLP exporter pipeline could not be created, fatal at startup.
    #[error("Failed to initialise OTLP exporter: {0}")]
    Exporter(String),

    /// Cancellation happened while waiting for a rate limiter permit.
    #[error("Rate limit wait cancelled for {0} call")]
    RateLimitExceeded(&'static str),

    /// A Cloud Trace API call failed.
    #[error("Cloud Trace call failed: {0}")]
    BackendCall(#[from] tonic::Status),

    /// Cancellation happened while a Cloud Trace API call was in flight.
    #[error("Cloud Trace call cancelled")]
    Cancelled,

    /// A trace or span identifier could not be re-encoded.
    #[error("Identifier decode error: {0}")]
    IdentifierDecode(#[from] IdError),

    /// A span timestamp cannot be represented as a `SystemTime`.
    #[error("Timestamp out of range: {seconds}s {nanos}ns")]
    TimestampOutOfRange {
        /// Seconds part of the timestamp.
        seconds: i64,
        /// Nanoseconds part of the timestamp.
        nanos: i32,
    },
}

impl BridgeError {
    /// Returns true if the error was caused by shutdown cancellation.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_) | Self::Cancelled)
    }
}

impl From<validator::ValidationErrors> for BridgeError {
    fn from(err: validator::ValidationErrors) -> Self {
        BridgeError::Config(err.to_string())
    }
}

/// Result type alias for `BridgeError`.
pub type Result<T> = std::result::Result<T, BridgeError>;

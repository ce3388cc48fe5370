//! Token-bucket limiter for Cloud Trace API calls.

use crate::error::{BridgeError, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tokio_util::sync::CancellationToken;

/// A named token bucket admitting one API call per permit.
///
/// Safe to share between tasks; waiting tasks are parked, not spinning.
pub struct CallLimiter {
    name: &'static str,
    limiter: DefaultDirectRateLimiter,
}

impl CallLimiter {
    /// Creates a limiter allowing `per_second` sustained calls and bursts of `burst`.
    #[must_use]
    pub fn new(name: &'static str, per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(per_second).allow_burst(burst);
        Self {
            name,
            limiter: RateLimiter::direct(quota),
        }
    }

    /// The call type this limiter guards, used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Waits until the bucket admits one call.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::RateLimitExceeded` if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(limiter = self.name, "Rate limit wait cancelled");
                Err(BridgeError::RateLimitExceeded(self.name))
            }
            () = self.limiter.until_ready() => Ok(()),
        }
    }
}

impl std::fmt::Debug for CallLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallLimiter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

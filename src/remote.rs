//! Timeout and retry policy for calls to hosted services
//!
//! Every remote call made by the speech and chat clients goes through
//! [`CallPolicy::run`]: each attempt is bounded by a deadline, and only
//! transient failures are retried, with exponential backoff between attempts.

use std::future::Future;
use std::time::{Duration, SystemTime};

use crate::error::RemoteError;

/// Retry policy for remote service calls
///
/// Controls how many times a failed request is retried and how
/// long to wait between attempts using exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 disables retrying)
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Compute the delay before the next retry attempt.
///
/// Follows exponential backoff: `min(base_delay * 2^attempt + jitter, max_delay)`.
/// Jitter is 0-25% of the computed delay, derived from `SystemTime`.
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    let base = base.min(policy.max_delay);

    let jitter_nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let jitter_fraction = f64::from(jitter_nanos % 250) / 1000.0;
    let jitter = base.mul_f64(jitter_fraction);

    (base + jitter).min(policy.max_delay)
}

/// Deadline and retry settings applied to one remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPolicy {
    /// Per-attempt deadline
    pub timeout: Duration,
    /// Retry behaviour for transient failures
    pub retry: RetryPolicy,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl CallPolicy {
    /// Run `op` under this policy
    ///
    /// `op` is invoked once per attempt. An attempt that exceeds the deadline
    /// is reported as [`RemoteError::Timeout`]. Structural failures
    /// ([`RemoteError::Malformed`], 4xx) are returned immediately.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once retries are exhausted
    pub async fn run<T, F, Fut>(&self, service: &'static str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(RemoteError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = delay_for_attempt(&self.retry, attempt);
                    tracing::warn!(
                        service,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(service, attempts = attempt + 1, error = %e, "remote call failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Turn a non-success HTTP response into [`RemoteError::Status`]
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    tracing::debug!(status = %status, "received response");

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

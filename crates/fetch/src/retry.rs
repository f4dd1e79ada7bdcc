// Bounded retry loop for manifest fetching.
//
// Backoff is linear: the wait after attempt `n` is `n * base_delay`.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::FetchError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff unit. The wait after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Progress of one retry loop. Created per fetch, dropped on success or exhaustion.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 1,
            max_attempts: policy.max_attempts.max(1),
            base_delay: policy.base_delay,
        }
    }

    /// Current attempt, 1-based.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Delay to wait after the current attempt failed.
    pub fn backoff(&self) -> Duration {
        self.base_delay.saturating_mul(self.attempt)
    }

    fn advance(&mut self) {
        self.attempt += 1;
    }
}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T> {
    /// Operation succeeded.
    Success(T),
    /// Transport failure (connect, timeout, body read).
    Retry(FetchError),
    /// Anything that must be surfaced immediately (upstream status, bad input).
    Fail(FetchError),
}

/// Execute an async operation with linear backoff.
///
/// The `operation` closure receives the current attempt number (1-based).
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, FetchError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = RetryAction<T>>,
{
    let mut state = RetryState::new(policy);
    loop {
        match operation(state.attempt()).await {
            RetryAction::Success(value) => return Ok(value),
            RetryAction::Fail(err) => return Err(err),
            RetryAction::Retry(err) => {
                if state.is_exhausted() {
                    warn!(
                        attempts = state.attempt(),
                        error = %err,
                        "Giving up after transient errors"
                    );
                    return Err(err);
                }
                let delay = state.backoff();
                warn!(
                    attempt = state.attempt(),
                    max = state.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                state.advance();
            }
        }
    }
}

/// Classify a reqwest error as retryable or non-retryable.
///
/// Retryable: connect, timeout, request, body read, and decode errors.
/// Non-retryable: redirect and builder errors.
pub fn is_retryable_reqwest_error(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() || e.is_decode()
}

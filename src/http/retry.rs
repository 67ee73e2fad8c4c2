//! Retry policy for HTTP requests with exponential backoff.

use reqwest::StatusCode;
use std::time::Duration;

/// Number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 10;

/// Base delay of the exponential backoff.
pub const DEFAULT_BACKOFF_FACTOR: Duration = Duration::from_millis(300);

/// Statuses that are worth asking again for.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Upper bound for a single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// How many times a request is retried and how long to wait in between.
///
/// A request is sent at most `max_retries + 1` times. The delay before retry
/// `n` (1-based) is `backoff_factor * 2^(n - 1)`, capped at [`MAX_BACKOFF`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: usize,
    backoff_factor: Duration,
    retryable_status_codes: Vec<StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: usize,
        backoff_factor: Duration,
        retryable_status_codes: impl IntoIterator<Item = StatusCode>,
    ) -> Self {
        Self {
            max_retries,
            backoff_factor,
            retryable_status_codes: retryable_status_codes.into_iter().collect(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_factor(mut self, backoff_factor: Duration) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Total number of times a request may be sent.
    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    pub fn backoff_factor(&self) -> Duration {
        self.backoff_factor
    }

    pub fn retryable_status_codes(&self) -> &[StatusCode] {
        &self.retryable_status_codes
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Delay to wait before retry number `retry` (1-based). Zero for `retry == 0`.
    pub fn backoff(&self, retry: usize) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(31) as u32;
        self.backoff_factor
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }
}

/// Whether a transport error may go away by sending the request again.
///
/// Builder errors (bad URL, bad header) never do.
pub fn is_retryable_transport(error: &reqwest::Error) -> bool {
    if error.is_builder() {
        return false;
    }
    error.is_connect() || error.is_timeout() || error.is_request() || error.is_body()
}

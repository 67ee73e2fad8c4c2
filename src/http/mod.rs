//! HTTP client module with retry logic and error handling.

mod client;
mod error;
mod retry;

pub use client::{HttpClient, REQUEST_TIMEOUT, default_client};
pub use error::{HttpError, check_status};
pub use retry::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES, DEFAULT_RETRYABLE_STATUS_CODES, MAX_BACKOFF,
    RetryPolicy, is_retryable_transport,
};

//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Only startup health
//! checks retry; event store operations make exactly one attempt.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::transport::TransportError;

/// Backoff for the startup health check.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Attempts are bounded by the health-check timeout, not a count
/// - Jitter enabled
pub fn healthcheck_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(usize::MAX)
        .with_jitter()
}

/// Determines if a failed health check is worth repeating.
///
/// Retryable:
/// - Connection errors and timeouts (cluster still starting)
/// - 5xx and 429 responses
/// - Unavailable
///
/// Non-retryable:
/// - `Closed`: the transport was shut down
/// - Other statuses (e.g. 401): retrying cannot fix credentials
pub fn is_retryable_transport_error(err: &TransportError) -> bool {
    match err {
        TransportError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
        TransportError::Status { status, .. } => *status == 429 || *status >= 500,
        TransportError::Unavailable(_) => true,
        TransportError::Closed
        | TransportError::AlreadyExists { .. }
        | TransportError::BulkItem { .. }
        | TransportError::Decode(_) => false,
    }
}

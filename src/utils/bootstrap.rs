//! Bootstrap utilities for buildevents binaries and backends.
//!
//! Shared initialization code: tracing setup and the startup health check.

use std::time::Duration;

use backon::Retryable;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::retry::{healthcheck_backoff, is_retryable_transport_error};
use crate::config::LOG_ENV_VAR;
use crate::transport::{SearchTransport, TransportError};

/// Initialize tracing with BUILDEVENTS_LOG environment variable.
///
/// Defaults to "info" level if BUILDEVENTS_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait until the cluster answers a health check.
///
/// Pings with exponential backoff until the cluster responds, a
/// non-retryable error comes back, or `timeout` elapses.
pub async fn wait_for_cluster(
    transport: &dyn SearchTransport,
    timeout: Duration,
) -> Result<(), TransportError> {
    let ping = || transport.ping();

    let attempt = ping
        .retry(healthcheck_backoff())
        .when(is_retryable_transport_error)
        .notify(|err: &TransportError, delay: Duration| {
            warn!(error = %err, retry_in = ?delay, "Cluster not ready");
        });

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(())) => {
            info!("Cluster is reachable");
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(TransportError::Unavailable(format!(
            "no healthy response within {:?}",
            timeout
        ))),
    }
}

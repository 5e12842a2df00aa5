//! Redis connection lifecycle.
//!
//! The connector owns the one Redis handle for the process. It reports
//! unavailability instead of returning errors so that every caller can
//! degrade to the in-memory fallback rather than failing the request path.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::metrics::FallbackMetrics;

/// Lazily established, memoized Redis connection handle.
///
/// Three states, with different retry behavior:
/// - no URL configured: `connection` returns `None` for the process
///   lifetime, there is nothing to retry;
/// - URL configured but establishment failed: `None` for this call only, the
///   next call dials again;
/// - established: the handle is memoized and cloned out. Reconnection after
///   an in-flight failure is the `ConnectionManager`'s own concern, so a
///   transient command error does not tear the handle down.
pub struct RedisConnector {
    url: Option<String>,
    command_timeout: Duration,
    handle: Mutex<Option<ConnectionManager>>,
    metrics: Arc<FallbackMetrics>,
}

impl std::fmt::Debug for RedisConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnector")
            .field("configured", &self.url.is_some())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl RedisConnector {
    /// Create a connector from settings. Performs no I/O.
    pub fn new(settings: &Settings, metrics: Arc<FallbackMetrics>) -> Self {
        if settings.redis_url.is_none() {
            info!("No Redis URL configured, running on the in-memory fallback only");
        }
        Self {
            url: settings.redis_url.clone(),
            command_timeout: settings.command_timeout(),
            handle: Mutex::new(None),
            metrics,
        }
    }

    /// Whether a Redis target was configured at all.
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// The per-command time bound callers must apply to Redis operations.
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Get the live connection handle, establishing it on first use.
    ///
    /// Returns `None` when Redis is unconfigured or cannot be reached right
    /// now; the caller is expected to serve the operation from the fallback
    /// store.
    pub async fn connection(&self) -> Option<ConnectionManager> {
        let mut guard = self.handle.lock().await;
        if let Some(manager) = guard.as_ref() {
            return Some(manager.clone());
        }

        let url = match self.url.as_deref() {
            Some(url) => url,
            None => {
                debug!("Redis unconfigured, skipping connection attempt");
                return None;
            }
        };

        match tokio::time::timeout(self.command_timeout, Self::establish(url)).await {
            Ok(Ok(manager)) => {
                info!("Redis connection established");
                *guard = Some(manager.clone());
                Some(manager)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Failed to establish Redis connection");
                self.metrics.record_connect_failure();
                None
            }
            Err(_) => {
                warn!(
                    timeout = ?self.command_timeout,
                    "Timed out establishing Redis connection"
                );
                self.metrics.record_connect_failure();
                None
            }
        }
    }

    async fn establish(url: &str) -> redis::RedisResult<ConnectionManager> {
        let client = Client::open(url)?;
        ConnectionManager::new(client).await
    }

    /// Release the memoized handle so a later call dials afresh.
    ///
    /// Idempotent: closing a connector that never connected is a no-op.
    pub async fn close(&self) {
        let mut guard = self.handle.lock().await;
        if guard.take().is_some() {
            info!("Redis connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(url: Option<&str>) -> RedisConnector {
        let settings = Settings {
            redis_url: url.map(String::from),
            command_timeout_ms: 200,
            ..Settings::default()
        };
        RedisConnector::new(&settings, Arc::new(FallbackMetrics::new()))
    }

    #[tokio::test]
    async fn test_unconfigured_returns_none() {
        let connector = connector(None);
        assert!(!connector.is_configured());
        assert!(connector.connection().await.is_none());
        // Unconfigured is a supported mode, not a connect failure.
        assert_eq!(connector.metrics.snapshot().connect_failures, 0);
    }

    #[tokio::test]
    async fn test_unreachable_target_counts_connect_failure() {
        // Port 1 refuses immediately; the dial fails rather than hangs.
        let connector = connector(Some("redis://127.0.0.1:1"));
        assert!(connector.connection().await.is_none());
        assert_eq!(connector.metrics.snapshot().connect_failures, 1);

        // A later call retries instead of latching the failure.
        assert!(connector.connection().await.is_none());
        assert_eq!(connector.metrics.snapshot().connect_failures, 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let connector = connector(None);
        connector.close().await;
        connector.close().await;
    }
}

//! Degrade-event counters.
//!
//! Every time an operation falls back to the in-process store, the reason is
//! recorded here as well as logged. The counters let an operator tell a Redis
//! outage (rising error/timeout counts) apart from a deployment that simply
//! never configured Redis (fallback operations only).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters shared by the connector, the rate limiter, and the cache.
#[derive(Debug, Default)]
pub struct FallbackMetrics {
    /// Connection establishment attempts that failed
    connect_failures: AtomicU64,
    /// Commands that failed in flight against a live connection
    redis_errors: AtomicU64,
    /// Commands that exceeded the configured timeout
    redis_timeouts: AtomicU64,
    /// Operations served by the in-memory fallback
    fallback_ops: AtomicU64,
}

impl FallbackMetrics {
    /// Create a fresh set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_redis_error(&self) {
        self.redis_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_redis_timeout(&self) {
        self.redis_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback_op(&self) {
        self.fallback_ops.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            redis_errors: self.redis_errors.load(Ordering::Relaxed),
            redis_timeouts: self.redis_timeouts.load(Ordering::Relaxed),
            fallback_ops: self.fallback_ops.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the degrade counters, suitable for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub connect_failures: u64,
    pub redis_errors: u64,
    pub redis_timeouts: u64,
    pub fallback_ops: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = FallbackMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connect_failures, 0);
        assert_eq!(snapshot.redis_errors, 0);
        assert_eq!(snapshot.redis_timeouts, 0);
        assert_eq!(snapshot.fallback_ops, 0);
    }

    #[test]
    fn test_record_and_snapshot() {
        let metrics = FallbackMetrics::new();
        metrics.record_connect_failure();
        metrics.record_redis_error();
        metrics.record_redis_error();
        metrics.record_fallback_op();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connect_failures, 1);
        assert_eq!(snapshot.redis_errors, 2);
        assert_eq!(snapshot.redis_timeouts, 0);
        assert_eq!(snapshot.fallback_ops, 1);
    }
}

//! Rate limiter front end.
//!
//! `RateLimiter::check` is the one call sites use: it tries the Redis
//! counter, degrades to the in-memory counter when Redis is unavailable or
//! failing, and always produces a decision. Backend trouble never reaches
//! the caller.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::backend::{CounterBackend, WindowHit};
use super::local::{LocalCounter, WindowSlot};
use super::policy::{PolicySet, RateLimitDecision, RateLimitPolicy};
use super::redis::RedisCounter;
use crate::connector::RedisConnector;
use crate::error::BreakwaterError;
use crate::memory::MemoryStore;
use crate::metrics::FallbackMetrics;

/// Fixed-window rate limiter with a per-call fallback path.
pub struct RateLimiter {
    primary: Box<dyn CounterBackend>,
    fallback: LocalCounter,
    policies: RwLock<PolicySet>,
    metrics: Arc<FallbackMetrics>,
}

impl RateLimiter {
    /// Create a limiter backed by Redis with the built-in policy presets.
    pub fn new(
        connector: Arc<RedisConnector>,
        store: Arc<MemoryStore<WindowSlot>>,
        metrics: Arc<FallbackMetrics>,
    ) -> Self {
        Self::with_primary(
            Box::new(RedisCounter::new(connector, metrics.clone())),
            store,
            metrics,
        )
    }

    /// Create a limiter over an explicit primary backend.
    ///
    /// This is the seam tests use to substitute a failing or scripted
    /// counter for the Redis one.
    pub fn with_primary(
        primary: Box<dyn CounterBackend>,
        store: Arc<MemoryStore<WindowSlot>>,
        metrics: Arc<FallbackMetrics>,
    ) -> Self {
        Self {
            primary,
            fallback: LocalCounter::new(store),
            policies: RwLock::new(PolicySet::builtin()),
            metrics,
        }
    }

    /// Replace the named policy set.
    pub fn set_policies(&self, policies: PolicySet) {
        *self.policies.write() = policies;
    }

    /// A copy of the current named policy set.
    pub fn policies(&self) -> PolicySet {
        self.policies.read().clone()
    }

    /// Check the rate limit for `identifier` under `policy`.
    ///
    /// Never fails. The worst case is reduced accuracy: when Redis is out,
    /// counting continues per instance in the fallback store.
    pub async fn check(&self, identifier: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let key = format!("{}:{}", policy.key_prefix, identifier);

        trace!(
            key = %key,
            max_requests = policy.max_requests,
            window = ?policy.window,
            "Checking rate limit"
        );

        let hit = match self
            .primary
            .hit(&key, policy.max_requests, policy.window)
            .await
        {
            Ok(hit) => hit,
            Err(err) => {
                if !matches!(err, BreakwaterError::Unavailable) {
                    warn!(
                        key = %key,
                        error = %err,
                        "Redis rate limit check failed, using in-memory fallback"
                    );
                }
                self.metrics.record_fallback_op();
                self.fallback.apply(&key, policy.max_requests, policy.window)
            }
        };

        if !hit.allowed {
            debug!(
                key = %key,
                count = hit.count,
                limit = hit.ceiling,
                "Rate limit exceeded"
            );
        }

        Self::decision(&hit)
    }

    /// Check the rate limit under a named policy from the current set.
    ///
    /// An unknown name falls back to the default policy rather than failing
    /// the request path.
    pub async fn check_named(&self, identifier: &str, name: &str) -> RateLimitDecision {
        let policy = {
            let policies = self.policies.read();
            match policies.get(name) {
                Some(policy) => policy.clone(),
                None => {
                    debug!(name = %name, "Unknown rate limit policy, using default");
                    RateLimitPolicy::default()
                }
            }
        };
        self.check(identifier, &policy).await
    }

    fn decision(hit: &WindowHit) -> RateLimitDecision {
        let reset_at = Utc::now()
            + chrono::Duration::from_std(hit.ttl).unwrap_or_else(|_| chrono::Duration::zero());
        RateLimitDecision {
            allowed: hit.allowed,
            remaining: hit.ceiling.saturating_sub(hit.count),
            reset_at,
            retry_after: (!hit.allowed).then_some(hit.ttl),
        }
    }
}

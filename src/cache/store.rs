//! Read-through cache over Redis with an in-memory fallback.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, trace, warn};

use crate::connector::RedisConnector;
use crate::error::{BreakwaterError, Result};
use crate::memory::{expiry, MemoryStore};
use crate::metrics::FallbackMetrics;

/// A cached value with its bookkeeping timestamps.
///
/// Stored in Redis as the JSON serialization of this struct under SETEX, and
/// in the fallback store as-is. The value itself is opaque to the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Cache front end with the same degrade policy as the rate limiter: Redis
/// first when connected, in-memory for the rest of that one call on any
/// error. Staleness beyond the TTL is never guaranteed against; the cache is
/// advisory, not authoritative.
pub struct Cache {
    connector: Arc<RedisConnector>,
    memory: Arc<MemoryStore<CacheEntry>>,
    metrics: Arc<FallbackMetrics>,
}

impl Cache {
    /// Create a cache over an existing connector and fallback store.
    pub fn new(
        connector: Arc<RedisConnector>,
        memory: Arc<MemoryStore<CacheEntry>>,
        metrics: Arc<FallbackMetrics>,
    ) -> Self {
        Self {
            connector,
            memory,
            metrics,
        }
    }

    /// Get the cached value for `key`, or `None` on a miss or expiry.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.redis_get(key).await {
            Ok(found) => {
                trace!(key = %key, hit = found.is_some(), "Redis cache get");
                return found.and_then(|entry| Self::decode(key, entry));
            }
            Err(err) => self.note_degrade("get", key, &err),
        }

        let entry = self.memory.get(key)?;
        Self::decode(key, entry)
    }

    /// Store `value` under `key` for `ttl`, overwriting unconditionally.
    ///
    /// Failures never surface: a value that cannot be serialized is logged
    /// and dropped, and a Redis write failure degrades to a memory write.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let data = match serde_json::to_value(value) {
            Ok(data) => data,
            Err(err) => {
                error!(key = %key, error = %err, "Failed to serialize cache value");
                return;
            }
        };

        let now = Utc::now();
        let entry = CacheEntry {
            data,
            cached_at: now,
            expires_at: expiry(now, ttl),
        };

        if let Err(err) = self.redis_set(key, &entry, ttl).await {
            self.note_degrade("set", key, &err);
            self.memory.insert(key, entry, ttl);
        }
    }

    /// Remove `key` from whichever backend holds it.
    ///
    /// The memory copy is cleared even when the Redis delete succeeds, so a
    /// value cached during an earlier degraded period cannot resurface.
    pub async fn delete(&self, key: &str) {
        if let Err(err) = self.redis_delete(key).await {
            self.note_degrade("delete", key, &err);
        }
        self.memory.remove(key);
    }

    /// Remove every key matching a glob pattern from both backends.
    pub async fn delete_by_pattern(&self, pattern: &str) {
        if let Err(err) = self.redis_delete_pattern(pattern).await {
            self.note_degrade("delete_by_pattern", pattern, &err);
        }
        self.memory.remove_matching(pattern);
    }

    /// Return the cached value for `key`, or fetch, store, and return it.
    ///
    /// The fetcher runs at most once per call, not per key: concurrent
    /// callers racing on a cold key each invoke their own fetcher. The only
    /// error this returns is the fetcher's own.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl: Duration,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = fetcher().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    async fn redis_get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = match self.connector.connection().await {
            Some(conn) => conn,
            None => return Err(BreakwaterError::Unavailable),
        };

        let raw: Option<String> = self.bounded(conn.get(key)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn redis_set(&self, key: &str, entry: &CacheEntry, ttl: Duration) -> Result<()> {
        let mut conn = match self.connector.connection().await {
            Some(conn) => conn,
            None => return Err(BreakwaterError::Unavailable),
        };

        let raw = serde_json::to_string(entry)?;
        let seconds = ttl.as_secs().max(1);
        self.bounded(conn.set_ex::<_, _, ()>(key, raw, seconds)).await
    }

    async fn redis_delete(&self, key: &str) -> Result<()> {
        let mut conn = match self.connector.connection().await {
            Some(conn) => conn,
            None => return Err(BreakwaterError::Unavailable),
        };

        self.bounded(conn.del::<_, ()>(key)).await
    }

    async fn redis_delete_pattern(&self, pattern: &str) -> Result<()> {
        let mut conn = match self.connector.connection().await {
            Some(conn) => conn,
            None => return Err(BreakwaterError::Unavailable),
        };

        let keys: Vec<String> = self.bounded(conn.keys(pattern)).await?;
        if keys.is_empty() {
            return Ok(());
        }
        self.bounded(conn.del::<_, ()>(keys)).await
    }

    /// Run a Redis future under the configured command timeout, mapping the
    /// outcome into the crate error space and counting degrade reasons.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T> {
        let timeout = self.connector.command_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                self.metrics.record_redis_error();
                Err(err.into())
            }
            Err(_) => {
                self.metrics.record_redis_timeout();
                Err(BreakwaterError::Timeout(timeout))
            }
        }
    }

    fn note_degrade(&self, op: &str, key: &str, err: &BreakwaterError) {
        if !matches!(err, BreakwaterError::Unavailable) {
            warn!(
                op = %op,
                key = %key,
                error = %err,
                "Redis cache operation failed, using in-memory fallback"
            );
        }
        self.metrics.record_fallback_op();
    }

    fn decode<T: DeserializeOwned>(key: &str, entry: CacheEntry) -> Option<T> {
        match serde_json::from_value(entry.data) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %key, error = %err, "Cached value failed to deserialize, treating as miss");
                None
            }
        }
    }
}

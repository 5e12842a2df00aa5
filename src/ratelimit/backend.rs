//! Counter backend trait abstracting the Redis and in-memory window stores.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of applying one request to a counter window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Whether the request was admitted.
    pub allowed: bool,
    /// The window's count after this request. Denied requests do not
    /// increment, so at the ceiling this stays put.
    pub count: u32,
    /// The ceiling the count was compared against. On the in-memory path
    /// this is the ceiling frozen at window creation, which can differ from
    /// the caller's current policy.
    pub ceiling: u32,
    /// Time left until the window resets.
    pub ttl: Duration,
}

/// A backend able to count requests in fixed windows.
///
/// Implemented by the Redis-backed counter and the in-memory fallback; the
/// [`RateLimiter`](super::RateLimiter) orchestrates between them. Test
/// doubles implement this trait to force the primary into failure modes that
/// are awkward to produce with a real server.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Apply one request to the window for `key`.
    ///
    /// Must be atomic with respect to concurrent hits on the same key, must
    /// not increment once the count has reached `ceiling`, and must start
    /// the TTL at `window` on the first hit of a fresh window.
    async fn hit(&self, key: &str, ceiling: u32, window: Duration) -> Result<WindowHit>;
}

//! In-memory window counter, the fallback behind the Redis counter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::backend::{CounterBackend, WindowHit};
use crate::error::Result;
use crate::memory::{expiry, Expiring, MemoryStore};

/// State of one fixed window in the fallback store.
///
/// The ceiling is recorded when the window is created and holds for the
/// window's whole lifetime: a policy change between calls applies from the
/// next window, never retroactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSlot {
    pub count: u32,
    pub ceiling: u32,
}

/// Fixed-window counter over the in-process store.
///
/// Updates run under the store's per-shard lock, so concurrent checks on the
/// same identifier serialize instead of losing increments.
pub struct LocalCounter {
    store: Arc<MemoryStore<WindowSlot>>,
}

impl LocalCounter {
    /// Create a counter over a shared fallback store.
    pub fn new(store: Arc<MemoryStore<WindowSlot>>) -> Self {
        Self { store }
    }

    /// Apply one request to the window for `key`. Infallible: the in-memory
    /// path has no I/O to fail.
    pub fn apply(&self, key: &str, ceiling: u32, window: Duration) -> WindowHit {
        let now = Utc::now();
        self.store.with_entry(key, now, |slot| match slot {
            None => {
                if ceiling == 0 {
                    return WindowHit {
                        allowed: false,
                        count: 0,
                        ceiling,
                        ttl: window,
                    };
                }
                *slot = Some(Expiring {
                    value: WindowSlot { count: 1, ceiling },
                    expires_at: expiry(now, window),
                });
                WindowHit {
                    allowed: true,
                    count: 1,
                    ceiling,
                    ttl: window,
                }
            }
            Some(entry) => {
                let ttl = (entry.expires_at - now).to_std().unwrap_or_default();
                let window_ceiling = entry.value.ceiling;
                if entry.value.count >= window_ceiling {
                    WindowHit {
                        allowed: false,
                        count: entry.value.count,
                        ceiling: window_ceiling,
                        ttl,
                    }
                } else {
                    entry.value.count += 1;
                    WindowHit {
                        allowed: true,
                        count: entry.value.count,
                        ceiling: window_ceiling,
                        ttl,
                    }
                }
            }
        })
    }
}

#[async_trait]
impl CounterBackend for LocalCounter {
    async fn hit(&self, key: &str, ceiling: u32, window: Duration) -> Result<WindowHit> {
        Ok(self.apply(key, ceiling, window))
    }
}

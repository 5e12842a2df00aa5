//! In-process fallback store.
//!
//! `MemoryStore` is the store both the rate limiter and the cache degrade to
//! when Redis is unreachable. It is not shared across processes: under
//! degradation each instance sees only the requests that landed on it, so
//! rate limits and cache hit rates are per-instance approximations. That is
//! an accepted tradeoff of the design, traded against never failing the
//! caller's request path.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A stored value together with its expiry instant.
#[derive(Debug, Clone)]
pub struct Expiring<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

/// An in-process map of string keys to expiring values.
///
/// Reads and writes go through DashMap's sharded locks, so concurrent access
/// from multiple request threads is safe without a global lock. Expiry is
/// wall-clock based and inclusive at the boundary: an entry whose
/// `expires_at` equals the current instant is already gone.
#[derive(Debug)]
pub struct MemoryStore<T> {
    entries: DashMap<String, Expiring<T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Get a live value for `key`.
    ///
    /// An expired entry that the sweeper has not reached yet is treated as a
    /// miss and removed on the spot.
    pub fn get(&self, key: &str) -> Option<T>
    where
        T: Clone,
    {
        let now = Utc::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                if occupied.get().expires_at <= now {
                    occupied.remove();
                    None
                } else {
                    Some(occupied.get().value.clone())
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Insert `value` under `key`, replacing any existing entry.
    pub fn insert(&self, key: &str, value: T, ttl: Duration) {
        let expires_at = expiry(Utc::now(), ttl);
        self.entries
            .insert(key.to_string(), Expiring { value, expires_at });
    }

    /// Remove the entry for `key`, if any.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove every entry whose key matches a glob pattern (`*` and `?`).
    pub fn remove_matching(&self, pattern: &str) {
        self.entries.retain(|key, _| !glob_match(pattern, key));
    }

    /// Read-modify-write the entry for `key` under its shard lock.
    ///
    /// The closure sees `None` when the key is absent or expired, and its
    /// final slot state is written back (or the entry removed when it leaves
    /// `None`). This is the synchronization point that replaces the original
    /// runtime's single-threaded read-then-write.
    pub fn with_entry<R>(
        &self,
        key: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Option<Expiring<T>>) -> R,
    ) -> R
    where
        T: Clone,
    {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = if occupied.get().expires_at <= now {
                    None
                } else {
                    Some(occupied.get().clone())
                };
                let result = f(&mut slot);
                match slot {
                    Some(updated) => {
                        occupied.insert(updated);
                    }
                    None => {
                        occupied.remove();
                    }
                }
                result
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                let result = f(&mut slot);
                if let Some(created) = slot {
                    vacant.insert(created);
                }
                result
            }
        }
    }

    /// Remove all entries whose expiry has passed. Returns how many were
    /// dropped. A single pass over the shards; get/insert on other keys are
    /// not blocked beyond the shard currently being scanned.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed = removed, "Swept expired fallback entries");
        }
        removed
    }

    /// Number of entries currently held, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<T: Send + Sync + 'static> MemoryStore<T> {
    /// Spawn a task that sweeps this store at a fixed interval.
    ///
    /// The returned handle is owned by the composition root; aborting it
    /// stops the sweeper. Entries still expire logically without the sweeper
    /// (`get` checks expiry), the sweep only bounds memory growth from keys
    /// that are set and never read again.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                trace!("Running fallback store sweep");
                store.sweep();
            }
        })
    }
}

/// Compute an expiry instant, saturating instead of overflowing for
/// pathological TTLs.
pub(crate) fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Match `text` against a glob `pattern` supporting `*` (any run of
/// characters) and `?` (any single character).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let store: MemoryStore<String> = MemoryStore::new();
        store.insert("a", "value".to_string(), Duration::from_secs(60));

        assert_eq!(store.get("a"), Some("value".to_string()));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_insert_overwrites() {
        let store: MemoryStore<u32> = MemoryStore::new();
        store.insert("k", 1, Duration::from_secs(60));
        store.insert("k", 2, Duration::from_secs(60));

        assert_eq!(store.get("k"), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_removed() {
        let store: MemoryStore<u32> = MemoryStore::new();
        store.insert("k", 7, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.get("k"), None);
        // The observing get removed the entry without waiting for a sweep.
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store: MemoryStore<u32> = MemoryStore::new();
        store.insert("old", 1, Duration::from_millis(10));
        store.insert("fresh", 2, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("fresh"), Some(2));
    }

    #[tokio::test]
    async fn test_spawn_sweeper_bounds_growth() {
        let store: Arc<MemoryStore<u32>> = Arc::new(MemoryStore::new());
        let handle = store.spawn_sweeper(Duration::from_millis(20));

        store.insert("k", 1, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.len(), 0);
        handle.abort();
    }

    #[test]
    fn test_remove_matching() {
        let store: MemoryStore<u32> = MemoryStore::new();
        store.insert("user:1:companies", 1, Duration::from_secs(60));
        store.insert("user:2:companies", 2, Duration::from_secs(60));
        store.insert("company:1:settings", 3, Duration::from_secs(60));

        store.remove_matching("user:*");

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("company:1:settings"), Some(3));
    }

    #[test]
    fn test_with_entry_creates_and_updates() {
        let store: MemoryStore<u32> = MemoryStore::new();
        let now = Utc::now();

        let created = store.with_entry("k", now, |slot| {
            assert!(slot.is_none());
            *slot = Some(Expiring {
                value: 1,
                expires_at: now + chrono::Duration::seconds(60),
            });
            true
        });
        assert!(created);

        store.with_entry("k", now, |slot| {
            let entry = slot.as_mut().unwrap();
            entry.value += 1;
        });
        assert_eq!(store.get("k"), Some(2));
    }

    #[test]
    fn test_with_entry_treats_expired_as_absent() {
        let store: MemoryStore<u32> = MemoryStore::new();
        let now = Utc::now();
        store.entries.insert(
            "k".to_string(),
            Expiring {
                value: 9,
                expires_at: now - chrono::Duration::seconds(1),
            },
        );

        store.with_entry("k", now, |slot| {
            assert!(slot.is_none());
        });
        // Leaving the slot as None drops the stale entry.
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("user:*", "user:123:companies"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("user:?:companies", "user:1:companies"));
        assert!(glob_match("user:*:settings", "user:9:settings"));
        assert!(!glob_match("user:*", "company:1"));
        assert!(!glob_match("user:?:companies", "user:12:companies"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }
}

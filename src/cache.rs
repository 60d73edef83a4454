//! Bounded, expiring response cache with single-flight loading.
//!
//! Remote lookups are expensive (a search may be several round trips), so the
//! client memoizes them. [`ResponseCache::get_or_try_insert_with`] is one atomic
//! get-or-compute step per key: concurrent callers for the same key wait for
//! the single in-flight computation instead of issuing their own requests.
//!
//! Reclamation:
//! - an entry is dead once it is older than the time-to-live
//! - when the entry count exceeds the capacity, the oldest-inserted entries
//!   are evicted first
//! - failed computations are never stored

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default number of cached entries.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default time-to-live of a cached entry (the catalog's session window).
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

struct Slot<V> {
    value: OnceCell<(V, Instant)>,
}

impl<V> Slot<V> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.value
            .get()
            .is_some_and(|(_, stored)| stored.elapsed() > ttl)
    }
}

/// Thread-safe cache keyed by strings.
///
/// # Examples
///
/// ```
/// use opc_connector::cache::ResponseCache;
/// use std::time::Duration;
///
/// let cache: ResponseCache<String> = ResponseCache::new(100, Duration::from_secs(60));
/// let value = cache.get_or_try_insert_with("key", || Ok::<_, ()>("computed".to_string()));
/// assert_eq!(value, Ok("computed".to_string()));
///
/// // second call is served from the cache
/// let value = cache.get_or_try_insert_with("key", || Err(()));
/// assert_eq!(value, Ok("computed".to_string()));
/// ```
pub struct ResponseCache<V> {
    entries: Mutex<IndexMap<String, Arc<Slot<V>>>>,
    capacity: usize,
    ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        ResponseCache {
            entries: Mutex::new(IndexMap::new()),
            capacity,
            ttl,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Time-to-live of an entry.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries currently held, including in-flight ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns `true` if a live, computed value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|slot| slot.value.get().is_some() && !slot.is_expired(self.ttl))
    }

    /// Return the cached value for `key`, computing it with `compute` if absent
    /// or expired.
    ///
    /// At most one computation per key runs at a time; other callers for the
    /// same key block until it finishes and then share its value. If the
    /// computation fails, nothing is stored and the error is returned; a
    /// blocked caller then runs its own computation, and its value is stored.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `compute`.
    pub fn get_or_try_insert_with<F, E>(&self, key: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key);

        let mut computed = false;
        let outcome = slot.value.get_or_try_init(|| {
            computed = true;
            compute().map(|value| (value, Instant::now()))
        });

        match outcome {
            Ok((value, _)) => {
                if computed {
                    // a failed computation ahead of us may have unlinked this slot
                    let mut entries = self.lock();
                    if !entries.contains_key(key) {
                        self.insert_slot(&mut entries, key, Arc::clone(&slot));
                    }
                } else {
                    debug!(key, "cache hit");
                }
                Ok(value.clone())
            },
            Err(err) => {
                let mut entries = self.lock();
                if entries
                    .get(key)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot) && current.value.get().is_none())
                {
                    entries.shift_remove(key);
                }
                Err(err)
            },
        }
    }

    fn slot(&self, key: &str) -> Arc<Slot<V>> {
        let mut entries = self.lock();

        if let Some(slot) = entries.get(key) {
            if !slot.is_expired(self.ttl) {
                return Arc::clone(slot);
            }
            entries.shift_remove(key);
        }

        let slot = Arc::new(Slot {
            value: OnceCell::new(),
        });
        self.insert_slot(&mut entries, key, Arc::clone(&slot));
        slot
    }

    fn insert_slot(&self, entries: &mut IndexMap<String, Arc<Slot<V>>>, key: &str, slot: Arc<Slot<V>>) {
        entries.insert(key.to_string(), slot);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Arc<Slot<V>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

//! Time-boxed memoization for expensive generation calls.
//!
//! Entries expire lazily on read and in periodic sweeps. When full, the
//! oldest-inserted entry is evicted (insertion order, not recency of use).

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use waypoint_core::AppResult;

/// Default capacity in entries.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries physically present, including expired ones not yet swept
    pub size: usize,
    pub max_size: usize,
    /// Keys in insertion order
    pub keys: Vec<String>,
}

#[derive(Debug)]
struct CacheEntry<V> {
    data: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Live while the age is at most `ttl`. A zero TTL is never live.
    fn is_expired(&self, now: Instant) -> bool {
        self.ttl.is_zero() || now.duration_since(self.created_at) > self.ttl
    }
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Keys oldest-inserted first
    order: VecDeque<String>,
}

impl<V> CacheState<V> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry)
    }
}

/// Bounded, thread-safe TTL cache.
#[derive(Debug)]
pub struct Cache<V> {
    state: Mutex<CacheState<V>>,
    max_entries: usize,
}

impl<V: Clone> Cache<V> {
    /// Create a cache holding at most `max_entries` entries (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_entries: max_entries.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `data` under `key` for `ttl`.
    ///
    /// A new key at capacity evicts the oldest-inserted entry first.
    /// Overwriting an existing key keeps its place in the insertion order.
    pub fn set(&self, key: impl Into<String>, data: V, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry {
            data,
            created_at: Instant::now(),
            ttl,
        };

        let mut state = self.state();

        if let Some(existing) = state.entries.get_mut(&key) {
            *existing = entry;
            return;
        }

        if state.entries.len() >= self.max_entries {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                tracing::debug!("Cache full, evicted '{}'", oldest);
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(key, entry);
    }

    /// Fetch a live entry. An expired entry is deleted and reported absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.state();

        let expired = state.entries.get(key)?.is_expired(Instant::now());
        if expired {
            state.remove(key);
            return None;
        }

        state.entries.get(key).map(|entry| entry.data.clone())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.state().remove(key).map(|entry| entry.data)
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn clean_expired(&self) -> usize {
        let mut state = self.state();
        let now = Instant::now();

        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        if state.entries.len() != before {
            let CacheState { entries, order } = &mut *state;
            order.retain(|key| entries.contains_key(key));
        }

        before - state.entries.len()
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.order.clear();
    }

    /// Entries physically present, expired or not.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_entries,
            keys: state.order.iter().cloned().collect(),
        }
    }
}

impl<V: Clone> Default for Cache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    /// Run `clean_expired` every `interval` on the tokio runtime.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let swept = cache.clean_expired();
                if swept > 0 {
                    tracing::debug!("Swept {} expired cache entries", swept);
                }
            }
        })
    }
}

/// Build a cache key from a prefix and serializable arguments.
///
/// Arguments are JSON-encoded, so string boundaries are escaped and
/// distinct argument tuples cannot produce the same key.
pub fn cache_key<T: Serialize + ?Sized>(prefix: &str, args: &T) -> AppResult<String> {
    Ok(format!("{}::{}", prefix, serde_json::to_string(args)?))
}

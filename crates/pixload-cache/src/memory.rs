//! LRU memory cache bounded by byte size.

use crate::types::CacheStats;
use lru::LruCache;
use pixload_core::CachedImage;
use pixload_core::ports::MemoryCache;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Default capacity: 64 MiB.
pub const DEFAULT_MAX_SIZE_BYTES: usize = 64 * 1024 * 1024;

/// Memory cache that evicts least-recently-used images once the total
/// footprint exceeds `max_size_bytes`.
pub struct LruMemoryCache {
    max_size_bytes: usize,
    state: Mutex<State>,
}

struct State {
    entries: LruCache<String, CachedImage>,
    size_bytes: usize,
    stats: CacheStats,
}

impl LruMemoryCache {
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            max_size_bytes,
            state: Mutex::new(State {
                entries: LruCache::unbounded(),
                size_bytes: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            size_bytes: state.size_bytes,
            count: state.entries.len(),
            ..state.stats.clone()
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LruMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE_BYTES)
    }
}

impl MemoryCache for LruMemoryCache {
    fn get(&self, key: &str) -> Option<CachedImage> {
        let mut state = self.lock();
        let found = state.entries.get(key).cloned();
        match found {
            Some(_) => state.stats.hits += 1,
            None => state.stats.misses += 1,
        }
        found
    }

    fn put(&self, key: String, image: CachedImage) {
        let size = image.size_bytes();
        let mut state = self.lock();

        if size > self.max_size_bytes {
            // Never cacheable; drop any stale entry under the same key.
            if let Some(old) = state.entries.pop(&key) {
                state.size_bytes -= old.size_bytes();
            }
            debug!(key = %key, size, max = self.max_size_bytes, "Image too large for memory cache");
            return;
        }

        if let Some(old) = state.entries.put(key, image) {
            state.size_bytes -= old.size_bytes();
        }
        state.size_bytes += size;
        state.stats.puts += 1;

        while state.size_bytes > self.max_size_bytes {
            match state.entries.pop_lru() {
                Some((evicted_key, evicted)) => {
                    state.size_bytes -= evicted.size_bytes();
                    state.stats.evictions += 1;
                    debug!(key = %evicted_key, "Evicted image from memory cache");
                }
                None => break,
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        let mut state = self.lock();
        match state.entries.pop(key) {
            Some(old) => {
                state.size_bytes -= old.size_bytes();
                true
            }
            None => false,
        }
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.size_bytes = 0;
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn size_bytes(&self) -> usize {
        self.lock().size_bytes
    }
}

//! Cache statistics.

/// Counters for a memory cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub evictions: u64,
    /// Current footprint in bytes.
    pub size_bytes: usize,
    /// Current number of entries.
    pub count: usize,
}

impl CacheStats {
    /// Hit rate in the range `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

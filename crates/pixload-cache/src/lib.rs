//! Memory cache layer for pixload.
//!
//! Computes cache keys for requests, decides whether a cached image can serve
//! a request, and provides an LRU store bounded by byte size.

pub mod keys;
pub mod memory;
pub mod types;
pub mod validation;

pub use keys::{KEY_SEPARATOR, compute_cache_key};
pub use memory::LruMemoryCache;
pub use types::CacheStats;
pub use validation::is_cached_image_valid;

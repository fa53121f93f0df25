//! Cache key generation.

use pixload_core::Parameters;
use pixload_core::ports::Transformation;
use std::sync::Arc;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '#';

/// Compute the memory cache key for a source, its parameters and its
/// transformation chain.
///
/// Returns `None` when the source is not cacheable. Otherwise the key is the
/// source key followed by `#name=cache_key` for every parameter that declares
/// a cache key (in insertion order), then `#key` for every transformation (in
/// chain order).
pub fn compute_cache_key(
    source_key: Option<&str>,
    parameters: &Parameters,
    transformations: &[Arc<dyn Transformation>],
) -> Option<String> {
    let source_key = source_key?;

    let mut key = String::from(source_key);
    for (name, parameter) in parameters.iter() {
        if let Some(cache_key) = parameter.cache_key() {
            key.push(KEY_SEPARATOR);
            key.push_str(name);
            key.push('=');
            key.push_str(cache_key);
        }
    }
    for transformation in transformations {
        key.push(KEY_SEPARATOR);
        key.push_str(&transformation.key());
    }
    Some(key)
}

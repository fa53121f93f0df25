//! Port traits.
//!
//! These traits define the interfaces between the request core and the
//! fetch, decode, transform, cache and presentation adapters.

use crate::ids::TargetId;
use crate::image::{CachedImage, DecodeResult, Image, ImageResult, SourceResult};
use crate::request::{Data, Options};
use crate::size::Size;
use crate::{Error, Result};
use async_trait::async_trait;

/// Loads raw bytes for a piece of request data.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Whether this fetcher can load `data`.
    fn handles(&self, data: &Data) -> bool;

    /// Source-level cache key, or `None` if results for `data` must not be
    /// cached.
    fn key(&self, data: &Data) -> Option<String>;

    /// Load the raw bytes.
    async fn fetch(&self, data: &Data, size: Size, options: &Options) -> Result<SourceResult>;
}

/// Turns fetched bytes into an image.
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Whether this decoder understands `source`.
    fn handles(&self, source: &SourceResult) -> bool;

    async fn decode(&self, source: SourceResult, size: Size, options: &Options)
    -> Result<DecodeResult>;
}

/// A post-decode image transformation.
#[async_trait]
pub trait Transformation: Send + Sync {
    /// Unique key for this transformation and its configuration. Appended to
    /// the memory cache key.
    fn key(&self) -> String;

    async fn transform(&self, input: Image) -> Result<Image>;
}

/// In-memory store of decoded images.
pub trait MemoryCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedImage>;

    fn put(&self, key: String, image: CachedImage);

    /// Returns whether an entry was removed.
    fn remove(&self, key: &str) -> bool;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current footprint in bytes.
    fn size_bytes(&self) -> usize;
}

/// A presentation surface that receives request results.
pub trait Target: Send + Sync {
    fn id(&self) -> TargetId;

    /// Measured size of the surface, used when a request leaves its size
    /// unset.
    fn size(&self) -> Option<Size> {
        None
    }

    fn on_start(&self) {}

    fn on_success(&self, result: &ImageResult);

    fn on_error(&self, _error: &Error) {}
}

/// Per-request lifecycle callbacks.
pub trait RequestListener: Send + Sync {
    fn on_start(&self) {}

    fn on_success(&self, _result: &ImageResult) {}

    fn on_error(&self, _error: &Error) {}

    fn on_cancel(&self) {}
}

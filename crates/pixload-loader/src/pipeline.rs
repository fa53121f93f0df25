//! The fetch, decode, transform and cache pipeline for a single request.

use crate::job::CancelSignal;
use crate::registry::ComponentRegistry;
use pixload_cache::{compute_cache_key, is_cached_image_valid};
use pixload_core::ports::MemoryCache;
use pixload_core::{
    CachedImage, DataSource, Error, ImageResult, Options, PixelFormat, Request, Result, Size,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Counters for pipeline activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_stores: u64,
    pub fetches: u64,
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    memory_stores: AtomicU64,
    fetches: AtomicU64,
}

/// Runs requests against a component registry and a memory cache.
pub struct RequestPipeline {
    registry: Arc<ComponentRegistry>,
    memory_cache: Arc<dyn MemoryCache>,
    counters: Counters,
}

impl RequestPipeline {
    pub fn new(registry: Arc<ComponentRegistry>, memory_cache: Arc<dyn MemoryCache>) -> Self {
        Self {
            registry,
            memory_cache,
            counters: Counters::default(),
        }
    }

    pub fn memory_cache(&self) -> &Arc<dyn MemoryCache> {
        &self.memory_cache
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            memory_misses: self.counters.memory_misses.load(Ordering::Relaxed),
            memory_stores: self.counters.memory_stores.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
        }
    }

    /// Produce the image for `request`, checking `signal` between steps.
    pub async fn execute(&self, request: &Request, signal: &CancelSignal) -> Result<ImageResult> {
        let size = resolve_size(request);
        let options = options_for(request);
        let data = request.data();

        let fetcher = self.registry.fetcher_for(data)?;
        let source_key = fetcher.key(data);
        let cache_key = compute_cache_key(
            source_key.as_deref(),
            request.parameters(),
            request.transformations(),
        );

        if let Some(key) = cache_key.as_deref()
            && request.memory_cache_policy().read_enabled()
        {
            if let Some(result) = self.lookup(key, size, request) {
                return Ok(result);
            }
            self.counters.memory_misses.fetch_add(1, Ordering::Relaxed);
        }

        signal.ensure_active()?;
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        let source = fetcher.fetch(data, size, &options).await?;
        let data_source = source.data_source;
        debug!(%data_source, bytes = source.bytes.len(), "Fetched source");

        signal.ensure_active()?;
        let decoder = self.registry.decoder_for(&source)?;
        let decoded = decoder.decode(source, size, &options).await?;
        let is_sampled = decoded.is_sampled;
        let mut image = decoded.image;

        for transformation in request.transformations() {
            signal.ensure_active()?;
            let key = transformation.key();
            image = transformation
                .transform(image)
                .await
                .map_err(|e| match e {
                    Error::Cancelled | Error::Transform { .. } => e,
                    other => Error::Transform {
                        key: key.clone(),
                        message: other.to_string(),
                    },
                })?;
            trace!(transformation = %key, "Applied transformation");
        }
        signal.ensure_active()?;

        let image = Arc::new(image);
        if let Some(key) = cache_key
            && request.memory_cache_policy().write_enabled()
        {
            debug!(cache_key = %key, "Storing image in memory cache");
            self.memory_cache
                .put(key, CachedImage::new(Arc::clone(&image), is_sampled));
            self.counters.memory_stores.fetch_add(1, Ordering::Relaxed);
        }

        Ok(ImageResult {
            image,
            is_sampled,
            data_source,
        })
    }

    fn lookup(&self, key: &str, size: Size, request: &Request) -> Option<ImageResult> {
        let cached = self.memory_cache.get(key)?;
        if !is_cached_image_valid(&cached.image, cached.is_sampled, size, request.scale(), request) {
            debug!(cache_key = %key, "Cached image cannot serve request");
            return None;
        }
        self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
        debug!(cache_key = %key, "Memory cache hit");
        Some(ImageResult {
            image: cached.image,
            is_sampled: cached.is_sampled,
            data_source: DataSource::MemoryCache,
        })
    }
}

/// The request's size, else the target's, else the original size.
pub fn resolve_size(request: &Request) -> Size {
    request
        .size()
        .or_else(|| request.target().and_then(|target| target.size()))
        .unwrap_or(Size::Original)
}

fn options_for(request: &Request) -> Options {
    let format = match request.format() {
        PixelFormat::Hardware if !request.allow_hardware() => PixelFormat::Argb8888,
        format => format,
    };
    Options {
        format,
        scale: request.scale(),
        allow_reduced_color: request.allow_reduced_color(),
        parameters: request.parameters().clone(),
        disk_cache_policy: request.disk_cache_policy(),
        network_cache_policy: request.network_cache_policy(),
    }
}

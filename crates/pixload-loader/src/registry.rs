//! Registry of fetchers and decoders.

use pixload_core::ports::{Decoder, Fetcher};
use pixload_core::{Data, Error, Result, SourceResult};
use std::sync::Arc;

/// Ordered fetchers and decoders. The first component that handles an input
/// wins, so more specific components should be registered first.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    fetchers: Vec<Arc<dyn Fetcher>>,
    decoders: Vec<Arc<dyn Decoder>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetchers.push(fetcher);
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoders.push(decoder);
        self
    }

    /// Find the fetcher for `data`.
    pub fn fetcher_for(&self, data: &Data) -> Result<&Arc<dyn Fetcher>> {
        self.fetchers
            .iter()
            .find(|fetcher| fetcher.handles(data))
            .ok_or_else(|| Error::UnsupportedData(data.to_string()))
    }

    /// Find the decoder for fetched bytes.
    pub fn decoder_for(&self, source: &SourceResult) -> Result<&Arc<dyn Decoder>> {
        self.decoders
            .iter()
            .find(|decoder| decoder.handles(source))
            .ok_or_else(|| Error::NoDecoder(source.mime_type.clone()))
    }

    pub fn fetcher_count(&self) -> usize {
        self.fetchers.len()
    }

    pub fn decoder_count(&self) -> usize {
        self.decoders.len()
    }
}

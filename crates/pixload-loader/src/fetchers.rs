//! Built-in fetchers for local files and in-memory bytes.

use async_trait::async_trait;
use pixload_core::ports::Fetcher;
use pixload_core::{Data, DataSource, Error, Options, Result, Size, SourceResult};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Reads images from the local filesystem.
///
/// The cache key includes the file's modification time, so edits on disk
/// invalidate cached results.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

#[async_trait]
impl Fetcher for FileFetcher {
    fn handles(&self, data: &Data) -> bool {
        matches!(data, Data::Path(_))
    }

    fn key(&self, data: &Data) -> Option<String> {
        let Data::Path(path) = data else {
            return None;
        };
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
        let millis = modified.duration_since(UNIX_EPOCH).ok()?.as_millis();
        Some(format!("{}:{}", path.display(), millis))
    }

    async fn fetch(&self, data: &Data, _size: Size, _options: &Options) -> Result<SourceResult> {
        let Data::Path(path) = data else {
            return Err(Error::UnsupportedData(data.to_string()));
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Fetch(format!("Failed to read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Read image file");

        Ok(SourceResult {
            bytes: bytes.into(),
            mime_type: mime_type_for(path),
            data_source: DataSource::Disk,
        })
    }
}

/// Serves images already held in memory. Results are never cached because
/// the bytes have no stable identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesFetcher;

#[async_trait]
impl Fetcher for BytesFetcher {
    fn handles(&self, data: &Data) -> bool {
        matches!(data, Data::Bytes(_))
    }

    fn key(&self, _data: &Data) -> Option<String> {
        None
    }

    async fn fetch(&self, data: &Data, _size: Size, _options: &Options) -> Result<SourceResult> {
        let Data::Bytes(bytes) = data else {
            return Err(Error::UnsupportedData(data.to_string()));
        };
        Ok(SourceResult {
            bytes: bytes.clone(),
            mime_type: None,
            data_source: DataSource::Memory,
        })
    }
}

fn mime_type_for(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(mime.to_string())
}

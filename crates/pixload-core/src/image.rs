//! Decoded images and pipeline intermediates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pixel storage format of a decoded image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Alpha8,
    /// Reduced-color, no alpha.
    Rgb565,
    #[default]
    Argb8888,
    RgbaF16,
    /// Hardware-backed; same visual quality as `Argb8888`.
    Hardware,
}

impl PixelFormat {
    /// Relative visual quality. `Hardware` ranks as `Argb8888`.
    pub fn quality_rank(self) -> u8 {
        match self {
            PixelFormat::Alpha8 => 0,
            PixelFormat::Rgb565 => 1,
            PixelFormat::Argb8888 | PixelFormat::Hardware => 2,
            PixelFormat::RgbaF16 => 3,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Alpha8 => 1,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Argb8888 | PixelFormat::Hardware => 4,
            PixelFormat::RgbaF16 => 8,
        }
    }

    pub fn is_reduced_color(self) -> bool {
        self == PixelFormat::Rgb565
    }
}

/// A decoded bitmap.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Arc<[u8]>,
}

impl Image {
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            format,
            pixels: pixels.into(),
        }
    }

    /// A zero-filled image of the given dimensions.
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self::new(width, height, format, vec![0u8; len])
    }

    /// Approximate memory footprint used for cache accounting.
    pub fn size_bytes(&self) -> usize {
        self.pixels
            .len()
            .max(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// A decoded image stored in the memory cache.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub image: Arc<Image>,
    /// Whether the image was decoded below the source's native resolution.
    pub is_sampled: bool,
}

impl CachedImage {
    pub fn new(image: Arc<Image>, is_sampled: bool) -> Self {
        Self { image, is_sampled }
    }

    pub fn size_bytes(&self) -> usize {
        self.image.size_bytes()
    }
}

/// Where a result was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    MemoryCache,
    Memory,
    Disk,
    Network,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSource::MemoryCache => "memory_cache",
            DataSource::Memory => "memory",
            DataSource::Disk => "disk",
            DataSource::Network => "network",
        };
        f.write_str(name)
    }
}

/// Raw bytes produced by a fetcher.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub bytes: Arc<[u8]>,
    pub mime_type: Option<String>,
    pub data_source: DataSource,
}

/// Output of a decoder.
#[derive(Debug, Clone)]
pub struct DecodeResult {
    pub image: Image,
    pub is_sampled: bool,
}

/// The image delivered to callers.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub image: Arc<Image>,
    pub is_sampled: bool,
    pub data_source: DataSource,
}

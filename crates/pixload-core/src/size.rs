//! Sizes, scale modes and precision.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exact pixel dimensions. Both dimensions are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPixelSize")]
pub struct PixelSize {
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct RawPixelSize {
    width: u32,
    height: u32,
}

impl TryFrom<RawPixelSize> for PixelSize {
    type Error = Error;

    fn try_from(raw: RawPixelSize) -> Result<Self> {
        PixelSize::new(raw.width, raw.height)
    }
}

impl PixelSize {
    /// Create a pixel size, rejecting zero dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSize { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl fmt::Display for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Requested output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Size {
    /// Decode at the source's native resolution.
    Original,
    Pixels(PixelSize),
}

impl Size {
    pub fn pixels(width: u32, height: u32) -> Result<Self> {
        PixelSize::new(width, height).map(Size::Pixels)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Original => write!(f, "original"),
            Size::Pixels(size) => size.fmt(f),
        }
    }
}

/// How an image is fitted into the requested bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// Cover the requested bounds, cropping any excess.
    #[default]
    Fill,
    /// Fit inside the requested bounds, preserving aspect ratio.
    Fit,
}

/// Whether output dimensions must match the request exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Exact,
    #[default]
    Inexact,
}

/// Multiplier that maps a source of `src_width`x`src_height` onto the
/// destination bounds under `scale`.
pub fn size_multiplier(
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    scale: Scale,
) -> f64 {
    let width_percent = dst_width as f64 / src_width as f64;
    let height_percent = dst_height as f64 / src_height as f64;
    match scale {
        Scale::Fill => width_percent.max(height_percent),
        Scale::Fit => width_percent.min(height_percent),
    }
}

/// Round to the nearest integer, with halves rounding up.
pub fn round_half_up(value: f64) -> u64 {
    (value + 0.5).floor().max(0.0) as u64
}

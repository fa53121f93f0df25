//! Decides whether a cached image can serve a request.

use pixload_core::size::{round_half_up, size_multiplier};
use pixload_core::{Image, PixelFormat, PixelSize, Precision, Request, Scale, Size};
use tracing::trace;

/// Return true if `cached` satisfies `request` at the requested `size` and
/// `scale`.
///
/// `is_sampled` records whether `cached` was decoded below its source's
/// native resolution. Under [`Precision::Exact`] the cached dimensions must be
/// scale-equivalent to `size`. Under [`Precision::Inexact`] an unsampled image
/// always passes the size check, while a sampled one must be large enough to
/// serve `size` without upscaling.
pub fn is_cached_image_valid(
    cached: &Image,
    is_sampled: bool,
    size: Size,
    scale: Scale,
    request: &Request,
) -> bool {
    if !is_format_valid(cached.format, request) {
        trace!(
            cached = ?cached.format,
            requested = ?request.format(),
            "Cached image format rejected"
        );
        return false;
    }

    let precision = request.precision();
    let valid = match size {
        Size::Original => precision == Precision::Inexact || !is_sampled,
        Size::Pixels(requested) => {
            is_size_valid(cached, is_sampled, requested, scale, precision)
        }
    };
    if !valid {
        trace!(
            width = cached.width,
            height = cached.height,
            is_sampled,
            %size,
            ?scale,
            ?precision,
            "Cached image size rejected"
        );
    }
    valid
}

fn is_format_valid(cached: PixelFormat, request: &Request) -> bool {
    if cached == PixelFormat::Hardware && !request.allow_hardware() {
        return false;
    }

    let requested = request.format();
    if cached.quality_rank() >= requested.quality_rank() {
        return true;
    }

    // Reduced color may stand in for full color when the request opts in.
    request.allow_reduced_color()
        && cached.is_reduced_color()
        && requested.quality_rank() == PixelFormat::Argb8888.quality_rank()
}

fn is_size_valid(
    cached: &Image,
    is_sampled: bool,
    requested: PixelSize,
    scale: Scale,
    precision: Precision,
) -> bool {
    if cached.width == 0 || cached.height == 0 {
        return false;
    }

    let multiplier = size_multiplier(
        cached.width,
        cached.height,
        requested.width(),
        requested.height(),
        scale,
    );

    match precision {
        Precision::Exact => {
            scales_to(cached.width, multiplier) == cached.width as u64
                && scales_to(cached.height, multiplier) == cached.height as u64
        }
        Precision::Inexact if !is_sampled => true,
        // Allow one pixel of rounding slack.
        Precision::Inexact => {
            scales_to(cached.width, multiplier) <= cached.width as u64 + 1
                && scales_to(cached.height, multiplier) <= cached.height as u64 + 1
        }
    }
}

fn scales_to(dimension: u32, multiplier: f64) -> u64 {
    round_half_up(dimension as f64 * multiplier)
}

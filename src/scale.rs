//! Display-size scaling policy and the pre-encode downscaler.
//!
//! [`compute_target_size`] decides how large a decoded image should be for a
//! requested display box. It fits the box while preserving aspect ratio and
//! never upscales past the source resolution.

use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};

use crate::CodecError;
use crate::bitmap::{PixelFormat, RawPlaneBuffer};

/// Pixel dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0,
        height: 0,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A `side × side` box.
    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    /// True when either component is zero ("no constraint").
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn longer_side(self) -> u32 {
        self.width.max(self.height)
    }

    pub fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Fit `source` into the `requested` display box.
///
/// The box is multiplied by `scale_factor` (values below 1, NaN, and
/// infinities count as 1). The side that constrains the fit is taken as
/// requested; the other side is derived from the source aspect ratio and
/// rounded up. Each side is then clamped to `1..=source`.
///
/// A requested box with a zero component returns `source` unchanged.
pub fn compute_target_size(source: Size, requested: Size, scale_factor: f64) -> Size {
    if requested.is_empty() || source.is_empty() {
        return source;
    }

    let scale = if scale_factor.is_finite() && scale_factor > 1.0 {
        scale_factor
    } else {
        1.0
    };
    let tw = box_side(requested.width, scale);
    let th = box_side(requested.height, scale);
    let sw = source.width as u128;
    let sh = source.height as u128;

    // sw/sh > tw/th, compared without division.
    let (width, height) = if sw * th > tw * sh {
        (tw, (tw * sh).div_ceil(sw))
    } else {
        ((th * sw).div_ceil(sh), th)
    };

    Size {
        width: clamp_side(width, source.width),
        height: clamp_side(height, source.height),
    }
}

fn box_side(side: u32, scale: f64) -> u128 {
    let scaled = (side as f64 * scale).round();
    if scaled >= u32::MAX as f64 {
        u32::MAX as u128
    } else {
        scaled as u128
    }
}

fn clamp_side(side: u128, source: u32) -> u32 {
    side.clamp(1, source as u128) as u32
}

/// Downscale a straight-RGBA buffer to `target` with a box filter.
///
/// Color is weighted by alpha so transparent pixels do not bleed into
/// their neighbours. `target` must not exceed the source in either
/// dimension; an equal size returns the buffer unchanged.
pub fn resample_rgba(buffer: RawPlaneBuffer, target: Size) -> Result<RawPlaneBuffer, CodecError> {
    let source = Size::new(buffer.width(), buffer.height());
    if target == source {
        return Ok(buffer);
    }
    if target.is_empty() || target.width > source.width || target.height > source.height {
        return Err(CodecError::InvalidInput(format!(
            "cannot resample {}x{} to {}x{}",
            source.width, source.height, target.width, target.height
        )));
    }
    let src = buffer
        .as_rgba()
        .filter(|_| buffer.format() == PixelFormat::Rgba8)
        .ok_or(CodecError::UnsupportedPixelFormat(buffer.format()))?;

    tracing::trace!(
        from_width = source.width,
        from_height = source.height,
        to_width = target.width,
        to_height = target.height,
        "box downscale"
    );

    let row_bytes = source.width as usize * 4;
    let repacked;
    let bytes = if buffer.stride() == row_bytes {
        &buffer.data()[..row_bytes * source.height as usize]
    } else {
        repacked = RawPlaneBuffer::from_rgba(src);
        repacked.data()
    };

    let src_image = ImageRef::new(source.width, source.height, bytes, PixelType::U8x4)
        .map_err(resize_error)?;
    let mut dst_image = Image::new(target.width, target.height, PixelType::U8x4);
    // Alpha multiply/divide around the filter keeps hidden color out.
    let options = ResizeOptions::new()
        .resize_alg(ResizeAlg::Convolution(FilterType::Box))
        .use_alpha(true);
    Resizer::new()
        .resize(&src_image, &mut dst_image, &options)
        .map_err(resize_error)?;

    RawPlaneBuffer::packed(
        target.width,
        target.height,
        PixelFormat::Rgba8,
        dst_image.into_vec(),
    )
}

fn resize_error(err: impl core::fmt::Display) -> CodecError {
    CodecError::InvalidInput(format!("resize failed: {err}"))
}

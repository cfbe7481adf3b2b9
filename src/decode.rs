//! Still image decoding.

use crate::CodecError;
use crate::animation::Compositor;
use crate::bitmap::{FromRawPlanes, PixelFormat, RawPlaneBuffer};
use crate::bridge::{convert_rgba, decode_format_for, from_raw_planes};
use crate::color::{ColorSpace, resolve_decode_color_space};
use crate::limits::Limits;
use crate::native::decode::{decode_into, features};
use crate::native::demux::Demuxer;
use crate::probe::{is_webp, probe};
use crate::scale::{Size, compute_target_size, resample_rgba};

/// Decoded pixels and their color tag.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub buffer: RawPlaneBuffer,
    pub color_space: ColorSpace,
    /// Loop count when the input was an animation (its first frame is
    /// returned); `None` for still images.
    pub loop_count: Option<u16>,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Hand the pixels to a bitmap type.
    pub fn into_bitmap<B: FromRawPlanes>(self) -> Result<B, CodecError> {
        from_raw_planes(self.buffer, self.color_space)
    }
}

/// Image decode request builder.
///
/// # Example
///
/// ```no_run
/// use zenwebpkit::{Bitmap, DecodeRequest};
///
/// let data: &[u8] = &[]; // your WebP bytes
/// let bitmap: Bitmap = DecodeRequest::new(data)
///     .with_max_display_size(512)
///     .with_scale_factor(2.0)
///     .decode()?;
/// # Ok::<(), zenwebpkit::CodecError>(())
/// ```
pub struct DecodeRequest<'a> {
    data: &'a [u8],
    display_size: Size,
    scale_factor: f64,
    limits: Option<&'a Limits>,
}

impl<'a> DecodeRequest<'a> {
    /// Create a new decode request at full size.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            display_size: Size::ZERO,
            scale_factor: 1.0,
            limits: None,
        }
    }

    /// Fit the output into a `side × side` box. Zero decodes at full size.
    pub fn with_max_display_size(self, side: u32) -> Self {
        self.with_display_size(Size::square(side))
    }

    /// Fit the output into `size`. A zero component decodes at full size.
    pub fn with_display_size(mut self, size: Size) -> Self {
        self.display_size = size;
        self
    }

    /// Multiply the display box by this factor. Values at or below 1 (and
    /// non-finite values) leave it unchanged.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Output size this request would produce, without decoding pixels.
    pub fn target_size(&self) -> Result<Size, CodecError> {
        if !is_webp(self.data) {
            return Err(CodecError::NotRecognizedFormat);
        }
        let features = features(self.data)?;
        Ok(compute_target_size(
            features.size,
            self.display_size,
            self.scale_factor,
        ))
    }

    /// Decode into a bitmap type, in the first layout it accepts.
    pub fn decode<B: FromRawPlanes>(self) -> Result<B, CodecError> {
        let format = decode_format_for::<B>()?;
        self.decode_raw(format)?.into_bitmap()
    }

    /// Decode into a raw buffer of the given layout.
    pub fn decode_raw(self, format: PixelFormat) -> Result<DecodedImage, CodecError> {
        if !is_webp(self.data) {
            return Err(CodecError::NotRecognizedFormat);
        }
        let default_limits = Limits::none();
        let limits = self.limits.unwrap_or(&default_limits);

        let features = features(self.data)?;
        if features.has_animation {
            return self.decode_first_frame(format, limits);
        }

        let target = compute_target_size(features.size, self.display_size, self.scale_factor);
        limits.check_dimensions(features.size)?;
        limits.check_output(target, format.bytes_per_pixel())?;
        tracing::debug!(
            source_width = features.size.width,
            source_height = features.size.height,
            target_width = target.width,
            target_height = target.height,
            ?format,
            "decoding still image"
        );

        let buffer = decode_into(self.data, features.size, target, format)?;
        Ok(DecodedImage {
            buffer,
            color_space: resolve_decode_color_space(self.icc_profile().as_deref()),
            loop_count: None,
        })
    }

    fn icc_profile(&self) -> Option<Vec<u8>> {
        let declared = probe(self.data).and_then(|p| p.has_icc).unwrap_or(false);
        if !declared {
            return None;
        }
        match Demuxer::new(self.data) {
            Ok(demux) => demux.icc_profile(),
            Err(e) => {
                tracing::debug!(error = %e, "could not read ICC chunk");
                None
            }
        }
    }

    fn decode_first_frame(
        self,
        format: PixelFormat,
        limits: &Limits,
    ) -> Result<DecodedImage, CodecError> {
        let mut compositor = Compositor::new(self.data, limits)?;
        let Some((canvas, _)) = compositor.next_frame()? else {
            return Err(CodecError::DecodeFailed("animation holds no frames".into()));
        };
        let source = Size::new(canvas.width(), canvas.height());
        let target = compute_target_size(source, self.display_size, self.scale_factor);
        limits.check_output(target, format.bytes_per_pixel())?;
        tracing::debug!(
            target_width = target.width,
            target_height = target.height,
            "decoding first animation frame"
        );

        let buffer = convert_rgba(resample_rgba(canvas, target)?, format)?;
        Ok(DecodedImage {
            buffer,
            color_space: compositor.color_space.clone(),
            loop_count: compositor.loop_count,
        })
    }
}

/// Decode `data` into a bitmap that fits a `max_display_size` square box
/// (zero for full size).
pub fn decode<B: FromRawPlanes>(data: &[u8], max_display_size: u32) -> Result<B, CodecError> {
    DecodeRequest::new(data)
        .with_max_display_size(max_display_size)
        .decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::{Bitmap, PlatformBitmap};
    use crate::config::EncoderConfig;
    use crate::encode::encode;

    fn sample(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let (r, g) = ((x * 255 / width) as u8, (y * 255 / height) as u8);
                data.extend_from_slice(&[r, g, 90, 255]);
            }
        }
        let bitmap = Bitmap::new(width, height, PixelFormat::Rgba8, data).unwrap();
        encode(&bitmap, &EncoderConfig::default()).unwrap()
    }

    #[test]
    fn rejects_other_formats() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert!(matches!(
            decode::<Bitmap>(png, 0),
            Err(CodecError::NotRecognizedFormat)
        ));
    }

    #[test]
    fn truncated_stream_fails() {
        let bytes = sample(32, 32);
        let err = decode::<Bitmap>(&bytes[..bytes.len() / 2], 0).unwrap_err();
        assert!(matches!(err, CodecError::DecodeFailed(_)));
    }

    #[test]
    fn full_size_by_default() {
        let bitmap: Bitmap = decode(&sample(40, 30), 0).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (40, 30));
        assert!(bitmap.color_space().is_device_rgb());
    }

    #[test]
    fn display_box_scales_down() {
        let bytes = sample(200, 100);
        let request = DecodeRequest::new(&bytes).with_max_display_size(50);
        assert_eq!(request.target_size().unwrap(), Size::new(50, 25));
        let bitmap: Bitmap = request.decode().unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (50, 25));
    }

    #[test]
    fn scale_factor_multiplies_box() {
        let bytes = sample(200, 100);
        let image = DecodeRequest::new(&bytes)
            .with_max_display_size(50)
            .with_scale_factor(2.0)
            .decode_raw(PixelFormat::Rgba8)
            .unwrap();
        assert_eq!(image.size(), Size::new(100, 50));
        assert_eq!(image.loop_count, None);
    }

    #[test]
    fn never_upscales() {
        let image = DecodeRequest::new(&sample(20, 10))
            .with_max_display_size(400)
            .decode_raw(PixelFormat::Bgra8)
            .unwrap();
        assert_eq!(image.size(), Size::new(20, 10));
        assert_eq!(image.buffer.format(), PixelFormat::Bgra8);
    }

    #[test]
    fn rgb_layout_is_packed() {
        let image = DecodeRequest::new(&sample(9, 7))
            .decode_raw(PixelFormat::Rgb8)
            .unwrap();
        assert_eq!(image.buffer.stride(), 27);
        assert_eq!(image.buffer.data().len(), 27 * 7);
    }

    #[test]
    fn limits_apply_to_output() {
        let bytes = sample(64, 64);
        let limits = Limits {
            max_pixels: Some(1000),
            ..Default::default()
        };
        let err = DecodeRequest::new(&bytes)
            .with_limits(&limits)
            .decode_raw(PixelFormat::Rgba8)
            .unwrap_err();
        assert!(matches!(err, CodecError::LimitExceeded(_)));
    }
}

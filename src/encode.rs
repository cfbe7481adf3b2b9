//! Still image encoding.

use imgref::ImgRef;
use libwebp_sys::WebPConfig;
use rgb::{RGB8, RGBA8};

use crate::CodecError;
use crate::bitmap::{Bitmap, PlatformBitmap};
use crate::bridge::to_raw_planes;
use crate::color::AlphaPolicy;
use crate::config::EncoderConfig;
use crate::limits::Limits;
use crate::native::encode::{encode_rgba, webp_config};
use crate::native::mux::Mux;
use crate::scale::{Size, compute_target_size, resample_rgba};

/// Image encode request builder.
///
/// # Example
///
/// ```no_run
/// use zenwebpkit::{EncodeRequest, EncoderConfigBuilder};
/// use imgref::ImgVec;
/// use rgb::RGBA8;
///
/// let pixels = ImgVec::new(vec![RGBA8::new(0, 0, 0, 255); 100 * 100], 100, 100);
/// let config = EncoderConfigBuilder::from_quality(85.0)?.build();
/// let webp = EncodeRequest::new(&config).encode_rgba8(pixels.as_ref())?;
/// # Ok::<(), zenwebpkit::CodecError>(())
/// ```
pub struct EncodeRequest<'a> {
    config: &'a EncoderConfig,
    embed_icc: bool,
    limits: Option<&'a Limits>,
}

impl<'a> EncodeRequest<'a> {
    pub fn new(config: &'a EncoderConfig) -> Self {
        Self {
            config,
            embed_icc: true,
            limits: None,
        }
    }

    /// Embed the bitmap's ICC profile, if it has one. On by default.
    pub fn with_embed_icc(mut self, embed_icc: bool) -> Self {
        self.embed_icc = embed_icc;
        self
    }

    /// Reject input bitmaps over these dimensions.
    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Encode a platform bitmap.
    pub fn encode<B: PlatformBitmap + ?Sized>(self, bitmap: &B) -> Result<Vec<u8>, CodecError> {
        if let Some(limits) = self.limits {
            limits.check_dimensions(Size::new(bitmap.width(), bitmap.height()))?;
        }
        let native = webp_config(self.config)?;
        let still = encode_still(bitmap, self.config, &native)?;

        let icc = bitmap.color_space().icc_profile().cloned();
        let bytes = match icc {
            Some(icc) if self.embed_icc => {
                let mut mux = Mux::new()?;
                mux.set_image(&still.bytes)?;
                mux.set_icc_profile(icc.as_bytes())?;
                mux.assemble()?
            }
            _ => still.bytes,
        };
        tracing::debug!(
            width = still.size.width,
            height = still.size.height,
            bytes = bytes.len(),
            "encoded still image"
        );
        Ok(bytes)
    }

    /// Encode RGBA8 pixels.
    pub fn encode_rgba8(self, img: ImgRef<'_, RGBA8>) -> Result<Vec<u8>, CodecError> {
        self.encode(&Bitmap::from_rgba8(img))
    }

    /// Encode RGB8 pixels.
    pub fn encode_rgb8(self, img: ImgRef<'_, RGB8>) -> Result<Vec<u8>, CodecError> {
        self.encode(&Bitmap::from_rgb8(img))
    }
}

/// Encode `bitmap` with `config`, embedding its ICC profile if tagged.
pub fn encode<B: PlatformBitmap + ?Sized>(
    bitmap: &B,
    config: &EncoderConfig,
) -> Result<Vec<u8>, CodecError> {
    EncodeRequest::new(config).encode(bitmap)
}

pub(crate) struct EncodedStill {
    pub bytes: Vec<u8>,
    /// Dimensions after any pre-scaling.
    pub size: Size,
}

/// Bridge, pre-scale to the config's pixel cap, and encode one image.
pub(crate) fn encode_still<B: PlatformBitmap + ?Sized>(
    bitmap: &B,
    config: &EncoderConfig,
    native: &WebPConfig,
) -> Result<EncodedStill, CodecError> {
    let bridged = to_raw_planes(bitmap)?;
    let source = Size::new(bridged.buffer.width(), bridged.buffer.height());
    let buffer = match config.max_pixel_size() {
        Some(max) => {
            let target = compute_target_size(source, max, 1.0);
            if target != source {
                tracing::trace!(
                    target_width = target.width,
                    target_height = target.height,
                    "pre-scaling before encode"
                );
            }
            resample_rgba(bridged.buffer, target)?
        }
        None => bridged.buffer,
    };
    let size = Size::new(buffer.width(), buffer.height());
    let bytes = encode_rgba(&buffer, AlphaPolicy::for_source(bridged.has_alpha), native)?;
    Ok(EncodedStill { bytes, size })
}

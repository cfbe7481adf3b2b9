use core::ffi::c_int;
use core::mem::MaybeUninit;

use libwebp_sys::{
    VP8StatusCode, WEBP_CSP_MODE, WebPBitstreamFeatures, WebPDecode, WebPDecoderConfig,
    WebPFreeDecBuffer, WebPGetFeatures, WebPRGBABuffer,
};

use super::status_message;
use crate::CodecError;
use crate::bitmap::{PixelFormat, RawPlaneBuffer};
use crate::scale::Size;

/// Bitstream features reported without decoding pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Features {
    pub size: Size,
    pub has_alpha: bool,
    pub has_animation: bool,
}

pub(crate) fn features(data: &[u8]) -> Result<Features, CodecError> {
    let mut raw = MaybeUninit::<WebPBitstreamFeatures>::zeroed();
    // SAFETY: `data` is valid for `data.len()` bytes; `raw` is writable.
    let status = unsafe { WebPGetFeatures(data.as_ptr(), data.len(), raw.as_mut_ptr()) };
    if status != VP8StatusCode::VP8_STATUS_OK {
        return Err(CodecError::DecodeFailed(status_message(status).into()));
    }
    // SAFETY: zero-initialized plain C struct, filled on success.
    let raw = unsafe { raw.assume_init() };
    Ok(Features {
        size: Size::new(raw.width as u32, raw.height as u32),
        has_alpha: raw.has_alpha != 0,
        has_animation: raw.has_animation != 0,
    })
}

fn colorspace(format: PixelFormat) -> WEBP_CSP_MODE {
    match format {
        PixelFormat::Rgba8 | PixelFormat::Rgbx8 => WEBP_CSP_MODE::MODE_RGBA,
        PixelFormat::Rgba8Premultiplied => WEBP_CSP_MODE::MODE_rgbA,
        PixelFormat::Bgra8 => WEBP_CSP_MODE::MODE_BGRA,
        PixelFormat::Bgra8Premultiplied => WEBP_CSP_MODE::MODE_bgrA,
        PixelFormat::Rgb8 => WEBP_CSP_MODE::MODE_RGB,
    }
}

struct DecoderConfig(WebPDecoderConfig);

impl Drop for DecoderConfig {
    fn drop(&mut self) {
        // SAFETY: output was initialized by WebPDecoderConfig::new; with external
        // memory this only resets bookkeeping.
        unsafe { WebPFreeDecBuffer(&mut self.0.output) };
    }
}

/// Decode a still image, scaled by the codec to `target`, into a buffer owned
/// by the caller.
pub(crate) fn decode_into(
    data: &[u8],
    source: Size,
    target: Size,
    format: PixelFormat,
) -> Result<RawPlaneBuffer, CodecError> {
    let config = WebPDecoderConfig::new()
        .map_err(|()| CodecError::DecodeFailed("decoder ABI mismatch".into()))?;
    let mut config = DecoderConfig(config);

    if target != source {
        config.0.options.use_scaling = 1;
        config.0.options.scaled_width = target.width as c_int;
        config.0.options.scaled_height = target.height as c_int;
    }

    let stride = target.width as usize * format.bytes_per_pixel();
    let mut pixels = vec![0u8; stride * target.height as usize];

    let output = &mut config.0.output;
    output.colorspace = colorspace(format);
    output.is_external_memory = 1;
    output.u.RGBA = WebPRGBABuffer {
        rgba: pixels.as_mut_ptr(),
        stride: stride as c_int,
        size: pixels.len(),
    };

    // SAFETY: `data` is valid for its length; the output buffer points into
    // `pixels`, which outlives the call and is large enough for the declared
    // stride and size.
    let status = unsafe { WebPDecode(data.as_ptr(), data.len(), &mut config.0) };
    if status != VP8StatusCode::VP8_STATUS_OK {
        return Err(CodecError::DecodeFailed(status_message(status).into()));
    }
    drop(config);

    RawPlaneBuffer::new(target.width, target.height, stride, format, pixels)
}

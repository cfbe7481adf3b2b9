use core::ffi::{c_int, c_void};
use core::mem::MaybeUninit;

use libwebp_sys::{
    WebPConfig, WebPEncode, WebPMemoryWrite, WebPMemoryWriter, WebPMemoryWriterClear,
    WebPMemoryWriterInit, WebPPicture, WebPPictureFree, WebPPictureImportRGBA,
    WebPPictureImportRGBX, WebPValidateConfig,
};

use super::encoding_error_message;
use crate::CodecError;
use crate::bitmap::{PixelFormat, RawPlaneBuffer};
use crate::color::AlphaPolicy;
use crate::config::EncoderConfig;

/// Preset-initialized native config with every present knob applied.
pub(crate) fn webp_config(config: &EncoderConfig) -> Result<WebPConfig, CodecError> {
    let mut native = WebPConfig::new_with_preset(config.preset().to_native(), config.seed_quality())
        .map_err(|()| CodecError::EncodeFailed("encoder ABI mismatch".into()))?;
    config.apply_to(&mut native);
    // SAFETY: `native` is a fully initialized config.
    if unsafe { WebPValidateConfig(&native) } == 0 {
        return Err(CodecError::EncodeFailed(
            "configuration rejected by encoder".into(),
        ));
    }
    Ok(native)
}

struct Picture(WebPPicture);

impl Drop for Picture {
    fn drop(&mut self) {
        // SAFETY: initialized by WebPPicture::new; free is a no-op on empty pictures.
        unsafe { WebPPictureFree(&mut self.0) };
    }
}

struct MemoryWriter(WebPMemoryWriter);

impl MemoryWriter {
    fn new() -> Self {
        let mut writer = MaybeUninit::<WebPMemoryWriter>::uninit();
        // SAFETY: WebPMemoryWriterInit fully initializes the struct.
        unsafe {
            WebPMemoryWriterInit(writer.as_mut_ptr());
            MemoryWriter(writer.assume_init())
        }
    }

    fn bytes(&self) -> &[u8] {
        if self.0.mem.is_null() {
            return &[];
        }
        // SAFETY: libwebp keeps `size` initialized bytes at `mem`.
        unsafe { core::slice::from_raw_parts(self.0.mem, self.0.size) }
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        // SAFETY: initialized in new(); clear frees `mem` and resets.
        unsafe { WebPMemoryWriterClear(&mut self.0) };
    }
}

/// Encode a packed straight-RGBA buffer to a still WebP file.
pub(crate) fn encode_rgba(
    buffer: &RawPlaneBuffer,
    alpha: AlphaPolicy,
    config: &WebPConfig,
) -> Result<Vec<u8>, CodecError> {
    if buffer.format() != PixelFormat::Rgba8 {
        return Err(CodecError::UnsupportedPixelFormat(buffer.format()));
    }
    let picture = WebPPicture::new()
        .map_err(|()| CodecError::EncodeFailed("encoder ABI mismatch".into()))?;
    let mut picture = Picture(picture);
    picture.0.width = buffer.width() as c_int;
    picture.0.height = buffer.height() as c_int;

    let stride = buffer.stride() as c_int;
    // SAFETY: `buffer` holds `height` rows of `stride` bytes of RGBA; the
    // picture copies the pixels during import.
    let imported = unsafe {
        match alpha {
            AlphaPolicy::Preserve => {
                WebPPictureImportRGBA(&mut picture.0, buffer.data().as_ptr(), stride)
            }
            AlphaPolicy::SynthesizeOpaque => {
                WebPPictureImportRGBX(&mut picture.0, buffer.data().as_ptr(), stride)
            }
        }
    };
    if imported == 0 {
        return Err(CodecError::EncodeFailed(
            encoding_error_message(picture.0.error_code).into(),
        ));
    }

    let mut writer = MemoryWriter::new();
    picture.0.writer = Some(WebPMemoryWrite);
    picture.0.custom_ptr = &mut writer.0 as *mut WebPMemoryWriter as *mut c_void;

    // SAFETY: config is validated, picture is populated, and `writer` stays
    // in place until after the call.
    let ok = unsafe { WebPEncode(config, &mut picture.0) };
    if ok == 0 {
        return Err(CodecError::EncodeFailed(
            encoding_error_message(picture.0.error_code).into(),
        ));
    }
    Ok(writer.bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let native = webp_config(&EncoderConfig::default()).unwrap();
        assert_eq!(native.quality, crate::config::DEFAULT_QUALITY);
    }

    #[test]
    fn rejected_config_is_encode_failure() {
        let config = EncoderConfig::default().with_unchecked_method(9);
        let err = webp_config(&config).unwrap_err();
        assert!(matches!(err, CodecError::EncodeFailed(_)), "{err:?}");
    }
}

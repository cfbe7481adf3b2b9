use core::ffi::c_int;
use core::ptr::NonNull;

use libwebp_sys::{
    WebPChunkId, WebPData, WebPDataClear, WebPMux, WebPMuxAnimBlend, WebPMuxAnimDispose,
    WebPMuxAnimParams, WebPMuxAssemble, WebPMuxDelete, WebPMuxError, WebPMuxFrameInfo, WebPMuxNew,
    WebPMuxPushFrame, WebPMuxSetAnimationParams, WebPMuxSetCanvasSize, WebPMuxSetChunk,
    WebPMuxSetImage,
};

use super::mux_error_message;
use crate::CodecError;
use crate::scale::Size;

/// Container writer. Every payload handed to it is copied.
pub(crate) struct Mux(NonNull<WebPMux>);

fn check(step: &str, err: WebPMuxError) -> Result<(), CodecError> {
    if err == WebPMuxError::WEBP_MUX_OK {
        Ok(())
    } else {
        Err(CodecError::EncodeFailed(format!(
            "{step}: {}",
            mux_error_message(err)
        )))
    }
}

fn borrowed(bytes: &[u8]) -> WebPData {
    WebPData {
        bytes: bytes.as_ptr(),
        size: bytes.len(),
    }
}

struct AssembledData(WebPData);

impl Drop for AssembledData {
    fn drop(&mut self) {
        // SAFETY: bytes were allocated by WebPMuxAssemble (or are null).
        unsafe { WebPDataClear(&mut self.0) };
    }
}

impl Mux {
    pub fn new() -> Result<Self, CodecError> {
        NonNull::new(WebPMuxNew())
            .map(Mux)
            .ok_or_else(|| CodecError::EncodeFailed("could not allocate muxer".into()))
    }

    /// Use `bitstream` (a still WebP file) as the single image.
    pub fn set_image(&mut self, bitstream: &[u8]) -> Result<(), CodecError> {
        // SAFETY: live mux; data is copied (copy_data = 1).
        let err = unsafe { WebPMuxSetImage(self.0.as_ptr(), &borrowed(bitstream), 1) };
        check("set image", err)
    }

    pub fn set_icc_profile(&mut self, icc: &[u8]) -> Result<(), CodecError> {
        // SAFETY: live mux, NUL-terminated fourcc; data is copied.
        let err =
            unsafe { WebPMuxSetChunk(self.0.as_ptr(), c"ICCP".as_ptr(), &borrowed(icc), 1) };
        check("set ICC profile", err)
    }

    /// Append an animation frame at the canvas origin that replaces (does
    /// not blend with) the canvas and is cleared after display.
    pub fn push_frame(&mut self, bitstream: &[u8], duration_ms: u32) -> Result<(), CodecError> {
        let frame = WebPMuxFrameInfo {
            bitstream: borrowed(bitstream),
            x_offset: 0,
            y_offset: 0,
            duration: duration_ms as c_int,
            id: WebPChunkId::WEBP_CHUNK_ANMF,
            dispose_method: WebPMuxAnimDispose::WEBP_MUX_DISPOSE_BACKGROUND,
            blend_method: WebPMuxAnimBlend::WEBP_MUX_NO_BLEND,
            pad: [0; 1],
        };
        // SAFETY: live mux; frame data is copied.
        let err = unsafe { WebPMuxPushFrame(self.0.as_ptr(), &frame, 1) };
        check("push frame", err)
    }

    /// `loop_count` 0 loops forever.
    pub fn set_animation_params(
        &mut self,
        bgcolor: u32,
        loop_count: u16,
    ) -> Result<(), CodecError> {
        let params = WebPMuxAnimParams {
            bgcolor,
            loop_count: loop_count as c_int,
        };
        // SAFETY: live mux, params read during the call.
        let err = unsafe { WebPMuxSetAnimationParams(self.0.as_ptr(), &params) };
        check("set animation params", err)
    }

    pub fn set_canvas_size(&mut self, size: Size) -> Result<(), CodecError> {
        // SAFETY: live mux.
        let err = unsafe {
            WebPMuxSetCanvasSize(self.0.as_ptr(), size.width as c_int, size.height as c_int)
        };
        check("set canvas size", err)
    }

    /// Serialize the container.
    pub fn assemble(&mut self) -> Result<Vec<u8>, CodecError> {
        let mut out = AssembledData(WebPData::default());
        // SAFETY: live mux, writable output owned by the guard.
        let err = unsafe { WebPMuxAssemble(self.0.as_ptr(), &mut out.0) };
        check("assemble", err)?;
        if out.0.bytes.is_null() {
            return Err(CodecError::EncodeFailed("assemble produced no data".into()));
        }
        // SAFETY: assembled buffer of `size` bytes, freed by the guard.
        let bytes = unsafe { core::slice::from_raw_parts(out.0.bytes, out.0.size) };
        Ok(bytes.to_vec())
    }
}

impl Drop for Mux {
    fn drop(&mut self) {
        // SAFETY: created by WebPMuxNew, deleted once.
        unsafe { WebPMuxDelete(self.0.as_ptr()) };
    }
}

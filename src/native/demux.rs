use core::ffi::{c_char, c_int};
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use libwebp_sys::{
    WEBP_DEMUX_ABI_VERSION, WebPChunkIterator, WebPData, WebPDemuxDelete, WebPDemuxGetChunk,
    WebPDemuxGetFrame, WebPDemuxGetI, WebPDemuxInternal, WebPDemuxNextFrame,
    WebPDemuxReleaseChunkIterator, WebPDemuxReleaseIterator, WebPDemuxer, WebPFeatureFlags,
    WebPFormatFeature, WebPIterator, WebPMuxAnimBlend, WebPMuxAnimDispose,
};

use crate::CodecError;
use crate::scale::Size;

/// Parsed container borrowing the input bytes.
pub(crate) struct Demuxer<'a> {
    ptr: NonNull<WebPDemuxer>,
    _data: PhantomData<&'a [u8]>,
}

/// One frame as stored in the container.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DemuxFrame<'a> {
    /// Single-image bitstream for this frame.
    pub fragment: &'a [u8],
    pub x_offset: u32,
    pub y_offset: u32,
    pub size: Size,
    pub duration_ms: u32,
    /// Clear the frame rectangle to transparent after display.
    pub dispose_to_background: bool,
    /// Alpha-blend onto the previous canvas instead of overwriting.
    pub blend: bool,
}

struct FrameIter(WebPIterator);

impl Drop for FrameIter {
    fn drop(&mut self) {
        // SAFETY: iterator was filled by WebPDemuxGetFrame.
        unsafe { WebPDemuxReleaseIterator(&mut self.0) };
    }
}

struct ChunkIter(WebPChunkIterator);

impl Drop for ChunkIter {
    fn drop(&mut self) {
        // SAFETY: iterator was filled by WebPDemuxGetChunk.
        unsafe { WebPDemuxReleaseChunkIterator(&mut self.0) };
    }
}

impl<'a> Demuxer<'a> {
    /// Parse a complete container. Partial data is rejected.
    pub fn new(data: &'a [u8]) -> Result<Self, CodecError> {
        let webp_data = WebPData {
            bytes: data.as_ptr(),
            size: data.len(),
        };
        // SAFETY: the demuxer keeps a pointer to `data`, which the returned
        // value borrows for 'a. `allow_partial` is 0 and no state is requested.
        let raw = unsafe {
            WebPDemuxInternal(
                &webp_data,
                0,
                ptr::null_mut(),
                WEBP_DEMUX_ABI_VERSION as c_int,
            )
        };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| CodecError::DecodeFailed("container could not be parsed".into()))?;
        Ok(Self {
            ptr,
            _data: PhantomData,
        })
    }

    fn get(&self, feature: WebPFormatFeature) -> u32 {
        // SAFETY: live demuxer.
        unsafe { WebPDemuxGetI(self.ptr.as_ptr(), feature) }
    }

    pub fn canvas_size(&self) -> Size {
        Size::new(
            self.get(WebPFormatFeature::WEBP_FF_CANVAS_WIDTH),
            self.get(WebPFormatFeature::WEBP_FF_CANVAS_HEIGHT),
        )
    }

    pub fn frame_count(&self) -> u32 {
        self.get(WebPFormatFeature::WEBP_FF_FRAME_COUNT)
    }

    /// Loop count from the ANIM chunk; 0 means forever.
    pub fn loop_count(&self) -> u32 {
        self.get(WebPFormatFeature::WEBP_FF_LOOP_COUNT)
    }

    fn has_flag(&self, flag: WebPFeatureFlags) -> bool {
        self.get(WebPFormatFeature::WEBP_FF_FORMAT_FLAGS) & flag as u32 != 0
    }

    pub fn is_animated(&self) -> bool {
        self.has_flag(WebPFeatureFlags::ANIMATION_FLAG)
    }

    /// Copy of the first `ICCP` chunk, if the container declares one.
    pub fn icc_profile(&self) -> Option<Vec<u8>> {
        if !self.has_flag(WebPFeatureFlags::ICCP_FLAG) {
            return None;
        }
        self.chunk(c"ICCP".as_ptr())
    }

    fn chunk(&self, fourcc: *const c_char) -> Option<Vec<u8>> {
        // SAFETY: all-zero is a valid "empty" chunk iterator.
        let mut iter = ChunkIter(unsafe { core::mem::zeroed() });
        // SAFETY: live demuxer, NUL-terminated fourcc, writable iterator.
        let found = unsafe { WebPDemuxGetChunk(self.ptr.as_ptr(), fourcc, 1, &mut iter.0) };
        if found == 0 || iter.0.chunk.bytes.is_null() {
            return None;
        }
        // SAFETY: chunk points into the borrowed input for `size` bytes.
        let bytes = unsafe { core::slice::from_raw_parts(iter.0.chunk.bytes, iter.0.chunk.size) };
        Some(bytes.to_vec())
    }

    /// Every frame in container order. A still image yields one frame.
    pub fn frames(&self) -> Result<Vec<DemuxFrame<'a>>, CodecError> {
        // SAFETY: all-zero is a valid "empty" frame iterator.
        let mut iter = FrameIter(unsafe { core::mem::zeroed() });
        // SAFETY: live demuxer, writable iterator.
        if unsafe { WebPDemuxGetFrame(self.ptr.as_ptr(), 1, &mut iter.0) } == 0 {
            return Err(CodecError::DecodeFailed("container holds no frames".into()));
        }

        let mut frames = Vec::with_capacity(iter.0.num_frames.max(0) as usize);
        loop {
            let it = &iter.0;
            if it.complete == 0 || it.fragment.bytes.is_null() {
                return Err(CodecError::DecodeFailed(format!(
                    "frame {} is incomplete",
                    it.frame_num
                )));
            }
            // SAFETY: fragment points into the input borrowed for 'a.
            let fragment: &'a [u8] =
                unsafe { core::slice::from_raw_parts(it.fragment.bytes, it.fragment.size) };
            frames.push(DemuxFrame {
                fragment,
                x_offset: it.x_offset as u32,
                y_offset: it.y_offset as u32,
                size: Size::new(it.width as u32, it.height as u32),
                duration_ms: it.duration.max(0) as u32,
                dispose_to_background: it.dispose_method
                    == WebPMuxAnimDispose::WEBP_MUX_DISPOSE_BACKGROUND,
                blend: it.blend_method == WebPMuxAnimBlend::WEBP_MUX_BLEND,
            });
            // SAFETY: iterator was filled by WebPDemuxGetFrame.
            if unsafe { WebPDemuxNextFrame(&mut iter.0) } == 0 {
                break;
            }
        }
        Ok(frames)
    }
}

impl Drop for Demuxer<'_> {
    fn drop(&mut self) {
        // SAFETY: created by WebPDemuxInternal, deleted once.
        unsafe { WebPDemuxDelete(self.ptr.as_ptr()) };
    }
}

//! Resource limits for decoding.

use crate::CodecError;
use crate::scale::Size;

/// Resource limits applied before the codec allocates output.
///
/// Used to reject hostile inputs early. All limits are optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Limits {
    /// Maximum output width in pixels.
    pub max_width: Option<u32>,
    /// Maximum output height in pixels.
    pub max_height: Option<u32>,
    /// Maximum output pixels (width × height).
    pub max_pixels: Option<u64>,
    /// Maximum bytes for a single output buffer.
    pub max_memory_bytes: Option<u64>,
    /// Maximum number of frames decoded from an animation.
    pub max_frames: Option<u32>,
}

impl Limits {
    /// Create a new Limits with no restrictions.
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if dimensions are within limits.
    pub fn check_dimensions(&self, size: Size) -> Result<(), CodecError> {
        if let Some(max_width) = self.max_width
            && size.width > max_width
        {
            return Err(CodecError::LimitExceeded(format!(
                "width {} exceeds {max_width}",
                size.width
            )));
        }
        if let Some(max_height) = self.max_height
            && size.height > max_height
        {
            return Err(CodecError::LimitExceeded(format!(
                "height {} exceeds {max_height}",
                size.height
            )));
        }
        if let Some(max_pixels) = self.max_pixels
            && size.pixel_count() > max_pixels
        {
            return Err(CodecError::LimitExceeded(format!(
                "{} pixels exceeds {max_pixels}",
                size.pixel_count()
            )));
        }
        Ok(())
    }

    /// Check if a buffer allocation is within limits.
    pub fn check_memory(&self, bytes: u64) -> Result<(), CodecError> {
        if let Some(max_memory) = self.max_memory_bytes
            && bytes > max_memory
        {
            return Err(CodecError::LimitExceeded(format!(
                "allocation of {bytes} bytes exceeds {max_memory}"
            )));
        }
        Ok(())
    }

    /// Check the frame count of an animation.
    pub fn check_frames(&self, frames: u32) -> Result<(), CodecError> {
        if let Some(max_frames) = self.max_frames
            && frames > max_frames
        {
            return Err(CodecError::LimitExceeded(format!(
                "{frames} frames exceeds {max_frames}"
            )));
        }
        Ok(())
    }

    /// Dimension and memory checks for one `bytes_per_pixel` output buffer.
    pub(crate) fn check_output(
        &self,
        size: Size,
        bytes_per_pixel: usize,
    ) -> Result<(), CodecError> {
        self.check_dimensions(size)?;
        self.check_memory(size.pixel_count().saturating_mul(bytes_per_pixel as u64))
    }
}

//! Image metadata without decoding pixels.

use crate::native::decode::features;
use crate::native::demux::Demuxer;
use crate::probe::is_webp;
use crate::{CodecError, Size};

/// Container-level metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ImageInfo {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    pub has_alpha: bool,
    pub has_animation: bool,
    /// Number of frames; 1 for still images.
    pub frame_count: u32,
    /// Animation loop count (0 = forever); `None` for still images.
    pub loop_count: Option<u16>,
    /// Embedded ICC profile bytes, unvalidated.
    pub icc_profile: Option<Vec<u8>>,
}

impl ImageInfo {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Read metadata from a complete WebP file.
pub fn from_bytes(data: &[u8]) -> Result<ImageInfo, CodecError> {
    if !is_webp(data) {
        return Err(CodecError::NotRecognizedFormat);
    }
    let features = features(data)?;
    let demux = Demuxer::new(data)?;
    let loop_count = features
        .has_animation
        .then(|| loop_count_from(demux.loop_count()));

    Ok(ImageInfo {
        width: features.size.width,
        height: features.size.height,
        has_alpha: features.has_alpha,
        has_animation: features.has_animation,
        frame_count: demux.frame_count(),
        loop_count,
        icc_profile: demux.icc_profile(),
    })
}

// The ANIM chunk stores 16 bits.
pub(crate) fn loop_count_from(raw: u32) -> u16 {
    u16::try_from(raw).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_webp() {
        assert!(matches!(
            from_bytes(b"GIF89a\x01\x00\x01\x00"),
            Err(CodecError::NotRecognizedFormat)
        ));
    }

    #[test]
    fn header_only_fails_decode() {
        let err = from_bytes(b"RIFF\x04\x00\x00\x00WEBP").unwrap_err();
        assert!(matches!(err, CodecError::DecodeFailed(_)));
    }

    #[test]
    fn loop_count_saturates() {
        assert_eq!(loop_count_from(0), 0);
        assert_eq!(loop_count_from(65_535), 65_535);
        assert_eq!(loop_count_from(1 << 20), u16::MAX);
    }
}

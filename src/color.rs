//! Color space tagging for decoded and encoded bitmaps.
//!
//! Decoding tags the output with the embedded ICC profile when it describes an
//! RGB space, and with device RGB otherwise. No pixel values are transformed;
//! only the tag travels with the bitmap.

use std::sync::Arc;

/// Color space a bitmap's pixel values are expressed in.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ColorSpace {
    /// Untagged device RGB.
    #[default]
    DeviceRgb,
    /// RGB space described by an embedded ICC profile.
    Icc(IccProfile),
}

impl ColorSpace {
    /// Device RGB. Constructed fresh on every call; nothing is cached.
    pub const fn device_rgb() -> Self {
        ColorSpace::DeviceRgb
    }

    pub fn is_device_rgb(&self) -> bool {
        matches!(self, ColorSpace::DeviceRgb)
    }

    /// ICC profile bytes, if tagged with one.
    pub fn icc_profile(&self) -> Option<&IccProfile> {
        match self {
            ColorSpace::Icc(profile) => Some(profile),
            ColorSpace::DeviceRgb => None,
        }
    }
}

/// Free-function form of [`ColorSpace::device_rgb`].
pub fn device_rgb() -> ColorSpace {
    ColorSpace::device_rgb()
}

/// A validated RGB ICC profile. Cloning shares the bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IccProfile {
    bytes: Arc<[u8]>,
}

impl IccProfile {
    /// Validate `bytes` as an RGB ICC profile.
    ///
    /// Returns `None` when the profile is malformed or describes a non-RGB
    /// data color space.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if !is_rgb_profile(bytes) {
            return None;
        }
        Some(Self {
            bytes: Arc::from(bytes),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Pick the color space for a decoded image.
///
/// Never fails: a missing, malformed, or non-RGB profile yields device RGB.
pub fn resolve_decode_color_space(icc: Option<&[u8]>) -> ColorSpace {
    let Some(bytes) = icc else {
        return ColorSpace::device_rgb();
    };
    match IccProfile::from_bytes(bytes) {
        Some(profile) => ColorSpace::Icc(profile),
        None => {
            tracing::debug!(
                len = bytes.len(),
                "embedded ICC profile unusable, falling back to device RGB"
            );
            ColorSpace::device_rgb()
        }
    }
}

/// How the encoder treats the alpha channel of a source bitmap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphaPolicy {
    /// Source has non-opaque pixels; keep them.
    Preserve,
    /// Source is opaque; encode with a synthesized opaque alpha.
    SynthesizeOpaque,
}

impl AlphaPolicy {
    pub fn for_source(has_alpha: bool) -> Self {
        if has_alpha {
            AlphaPolicy::Preserve
        } else {
            AlphaPolicy::SynthesizeOpaque
        }
    }
}

const ICC_HEADER_LEN: usize = 128;

#[cfg(feature = "cms")]
fn is_rgb_profile(bytes: &[u8]) -> bool {
    if bytes.len() < ICC_HEADER_LEN {
        return false;
    }
    match moxcms::ColorProfile::new_from_slice(bytes) {
        Ok(profile) => profile.color_space == moxcms::DataColorSpace::Rgb,
        Err(e) => {
            tracing::trace!(error = %e, "ICC profile rejected by parser");
            false
        }
    }
}

// Header-only check: signature and data color space.
#[cfg(not(feature = "cms"))]
fn is_rgb_profile(bytes: &[u8]) -> bool {
    bytes.len() >= ICC_HEADER_LEN && &bytes[36..40] == b"acsp" && &bytes[16..20] == b"RGB "
}

/// Smallest well-formed display-class RGB profile: header plus an empty tag table.
#[cfg(test)]
pub(crate) fn minimal_rgb_icc() -> Vec<u8> {
    let mut icc = vec![0u8; ICC_HEADER_LEN + 4];
    let len = icc.len() as u32;
    icc[0..4].copy_from_slice(&len.to_be_bytes());
    icc[8..12].copy_from_slice(&0x0440_0000u32.to_be_bytes());
    icc[12..16].copy_from_slice(b"mntr");
    icc[16..20].copy_from_slice(b"RGB ");
    icc[20..24].copy_from_slice(b"XYZ ");
    icc[36..40].copy_from_slice(b"acsp");
    // D50 illuminant
    icc[68..72].copy_from_slice(&0x0000_F6D6u32.to_be_bytes());
    icc[72..76].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    icc[76..80].copy_from_slice(&0x0000_D32Du32.to_be_bytes());
    icc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_profile_is_device_rgb() {
        assert_eq!(resolve_decode_color_space(None), ColorSpace::DeviceRgb);
    }

    #[test]
    fn garbage_profile_falls_back() {
        let cs = resolve_decode_color_space(Some(b"definitely not an icc profile"));
        assert!(cs.is_device_rgb());
    }

    #[test]
    fn truncated_profile_falls_back() {
        let icc = minimal_rgb_icc();
        let cs = resolve_decode_color_space(Some(&icc[..40]));
        assert!(cs.is_device_rgb());
    }

    #[test]
    fn rgb_profile_is_kept() {
        let icc = minimal_rgb_icc();
        let cs = resolve_decode_color_space(Some(&icc));
        assert_eq!(cs.icc_profile().map(|p| p.as_bytes()), Some(&icc[..]));
    }

    #[test]
    fn gray_profile_falls_back() {
        let mut icc = minimal_rgb_icc();
        icc[16..20].copy_from_slice(b"GRAY");
        assert!(resolve_decode_color_space(Some(&icc)).is_device_rgb());
    }

    #[test]
    fn device_rgb_is_fresh_value() {
        assert_eq!(device_rgb(), ColorSpace::default());
    }

    #[test]
    fn alpha_policy() {
        assert_eq!(AlphaPolicy::for_source(true), AlphaPolicy::Preserve);
        assert_eq!(
            AlphaPolicy::for_source(false),
            AlphaPolicy::SynthesizeOpaque
        );
    }
}

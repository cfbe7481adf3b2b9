//! Header-only WebP probing.
//!
//! Reads at most the first 30 bytes: the 12-byte RIFF header plus the first
//! chunk header and the few bytes of it that carry dimensions and flags. Never
//! allocates and never calls into the codec, so it is safe to run on untrusted
//! or truncated input (e.g. the first bytes of an HTTP range request).

use crate::ImageFormat;

/// Bitstream flavor announced by the first chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebpKind {
    /// `VP8 ` chunk: simple lossy image.
    Lossy,
    /// `VP8L` chunk: simple lossless image.
    Lossless,
    /// `VP8X` chunk: extended format (alpha, ICC, animation, metadata).
    Extended,
}

/// Result of probing a WebP header.
///
/// Every field is `Option`, since truncated input may not reach it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ProbeResult {
    pub kind: Option<WebpKind>,
    /// Canvas width in pixels.
    pub width: Option<u32>,
    /// Canvas height in pixels.
    pub height: Option<u32>,
    pub has_alpha: Option<bool>,
    pub has_animation: Option<bool>,
    /// Whether an ICC profile chunk is announced.
    pub has_icc: Option<bool>,
    /// Number of bytes examined from the input.
    pub bytes_examined: usize,
}

/// Whether `data` starts with a WebP container header.
///
/// Only the 12-byte `RIFF....WEBP` header is checked; payload corruption past
/// it is not detected here.
pub fn is_webp(data: &[u8]) -> bool {
    ImageFormat::detect(data) == Some(ImageFormat::WebP)
}

/// Whether this crate can decode `data`. Same test as [`is_webp`].
pub fn is_supported_format(data: &[u8]) -> bool {
    is_webp(data)
}

// Offsets into a WebP file. The first chunk header sits at 12..20 and its
// payload starts at 20.
//
// - VP8X: flags at 20, canvas dimensions at 24..30 (24-bit LE, stored minus one)
// - VP8 : frame tag at 20..23, start code 9D 01 2A at 23..26, dimensions at 26..30
// - VP8L: signature 0x2F at 20, dimensions bit-packed in 21..25
const VP8X_ICC: u8 = 0x20;
const VP8X_ALPHA: u8 = 0x10;
const VP8X_ANIMATION: u8 = 0x02;

/// Parse the container header.
///
/// Returns `None` unless `data` carries the `RIFF....WEBP` header. Fields the
/// input is too short for are left `None`.
pub fn probe(data: &[u8]) -> Option<ProbeResult> {
    if !is_webp(data) {
        return None;
    }

    let mut result = ProbeResult {
        kind: None,
        width: None,
        height: None,
        has_alpha: None,
        has_animation: None,
        has_icc: None,
        bytes_examined: data.len().min(30),
    };

    let Some(fourcc) = data.get(12..16) else {
        return Some(result);
    };

    match fourcc {
        b"VP8X" => {
            result.kind = Some(WebpKind::Extended);
            if let Some(&flags) = data.get(20) {
                result.has_icc = Some(flags & VP8X_ICC != 0);
                result.has_alpha = Some(flags & VP8X_ALPHA != 0);
                result.has_animation = Some(flags & VP8X_ANIMATION != 0);
            }
            if let Some(dims) = data.get(24..30) {
                result.width = Some(u24_le(&dims[0..3]) + 1);
                result.height = Some(u24_le(&dims[3..6]) + 1);
            }
        }
        b"VP8 " => {
            result.kind = Some(WebpKind::Lossy);
            result.has_alpha = Some(false);
            result.has_animation = Some(false);
            result.has_icc = Some(false);
            if let Some(frame) = data.get(23..30)
                && frame[..3] == [0x9D, 0x01, 0x2A]
            {
                result.width = Some((u16::from_le_bytes([frame[3], frame[4]]) & 0x3FFF) as u32);
                result.height = Some((u16::from_le_bytes([frame[5], frame[6]]) & 0x3FFF) as u32);
            }
        }
        b"VP8L" => {
            result.kind = Some(WebpKind::Lossless);
            result.has_animation = Some(false);
            result.has_icc = Some(false);
            if let Some(header) = data.get(20..25)
                && header[0] == 0x2F
            {
                let bits = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
                result.width = Some((bits & 0x3FFF) + 1);
                result.height = Some(((bits >> 14) & 0x3FFF) + 1);
                result.has_alpha = Some((bits >> 28) & 1 != 0);
            }
        }
        _ => {}
    }

    Some(result)
}

fn u24_le(b: &[u8]) -> u32 {
    b[0] as u32 | (b[1] as u32) << 8 | (b[2] as u32) << 16
}

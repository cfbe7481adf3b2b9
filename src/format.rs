//! Magic-byte sniffing for dispatching non-WebP input elsewhere.
//!
//! This crate only decodes WebP. [`ImageFormat::detect`] lets an integrating
//! layer decide, before calling into it, whether a buffer belongs here or to a
//! generic image loader.

/// Image container formats recognized by their leading bytes.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    WebP,
    Jpeg,
    Png,
    Gif,
    Avif,
}

impl ImageFormat {
    /// Detect format from magic bytes. Returns None if unrecognized.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP".as_slice()) {
            return Some(ImageFormat::WebP);
        }
        // ISO-BMFF `ftyp` box with an AVIF image or sequence brand.
        if matches!(data.get(4..12), Some(b"ftypavif" | b"ftypavis")) {
            return Some(ImageFormat::Avif);
        }
        match data {
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageFormat::Png),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageFormat::Gif),
            _ => None,
        }
    }

    /// MIME type string.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::WebP => "image/webp",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Avif => "image/avif",
        }
    }
}

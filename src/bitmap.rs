//! Platform bitmap capability and raw pixel plane buffers.
//!
//! The conversion core never depends on a concrete bitmap type. Anything that
//! can expose its pixels ([`PlatformBitmap`]) can be encoded, and anything that
//! can adopt a decoded buffer ([`FromRawPlanes`]) can be decoded into.
//! [`Bitmap`] is the crate's own owned implementation of both.

use imgref::{ImgRef, ImgVec};
use rgb::{RGB8, RGBA8};

use crate::CodecError;
use crate::color::ColorSpace;

/// Interleaved 8-bit pixel layouts understood by the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// R, G, B, A with straight (unassociated) alpha.
    Rgba8,
    /// R, G, B, A with color premultiplied by alpha.
    Rgba8Premultiplied,
    /// B, G, R, A with straight alpha.
    Bgra8,
    /// B, G, R, A with color premultiplied by alpha.
    Bgra8Premultiplied,
    /// R, G, B and an ignored fourth byte.
    Rgbx8,
    /// R, G, B, no alpha.
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            _ => 4,
        }
    }

    /// Whether the layout carries a meaningful alpha channel.
    pub const fn has_alpha_channel(self) -> bool {
        !matches!(self, PixelFormat::Rgbx8 | PixelFormat::Rgb8)
    }

    /// Whether color channels are premultiplied by alpha.
    pub const fn is_premultiplied(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgba8Premultiplied | PixelFormat::Bgra8Premultiplied
        )
    }

    /// Whether red and blue are swapped relative to RGB order.
    pub const fn is_bgr_order(self) -> bool {
        matches!(self, PixelFormat::Bgra8 | PixelFormat::Bgra8Premultiplied)
    }
}

/// An exclusively owned, interleaved pixel buffer.
///
/// Rows are `stride` bytes apart; only the first `width * bytes_per_pixel`
/// bytes of each row are pixel data. Moved (never shared) between the bridge
/// and the codec adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPlaneBuffer {
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl RawPlaneBuffer {
    /// Wrap `data` after checking it covers the declared geometry.
    pub fn new(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, CodecError> {
        validate_geometry(width, height, stride, format, data.len())?;
        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
        })
    }

    /// Tightly packed buffer (stride = width × bytes per pixel).
    pub fn packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, CodecError> {
        let stride = width as usize * format.bytes_per_pixel();
        Self::new(width, height, stride, format, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Give up ownership of the pixel storage.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Pixel bytes of row `y`, without stride padding. `None` past the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        let len = self.width as usize * self.format.bytes_per_pixel();
        self.data.get(start..start + len)
    }

    /// Typed view for straight or premultiplied RGBA buffers.
    ///
    /// Returns `None` for other layouts or a stride that is not a whole
    /// number of pixels.
    pub fn as_rgba(&self) -> Option<ImgRef<'_, RGBA8>> {
        if !matches!(
            self.format,
            PixelFormat::Rgba8 | PixelFormat::Rgba8Premultiplied
        ) || self.stride % 4 != 0
        {
            return None;
        }
        let whole = self.data.len() / 4 * 4;
        let pixels: &[RGBA8] = bytemuck::try_cast_slice(&self.data[..whole]).ok()?;
        Some(ImgRef::new_stride(
            pixels,
            self.width as usize,
            self.height as usize,
            self.stride / 4,
        ))
    }

    /// Build a packed straight-RGBA buffer from a typed image.
    pub fn from_rgba(img: ImgRef<'_, RGBA8>) -> Self {
        let mut data = Vec::with_capacity(img.width() * img.height() * 4);
        for row in img.rows() {
            data.extend_from_slice(bytemuck::cast_slice(row));
        }
        Self {
            width: img.width() as u32,
            height: img.height() as u32,
            stride: img.width() * 4,
            format: PixelFormat::Rgba8,
            data,
        }
    }
}

pub(crate) fn validate_geometry(
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    len: usize,
) -> Result<(), CodecError> {
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidInput(format!(
            "zero-sized buffer {width}x{height}"
        )));
    }
    let row_bytes = (width as usize)
        .checked_mul(format.bytes_per_pixel())
        .ok_or_else(|| CodecError::InvalidInput("row size overflows".into()))?;
    if stride < row_bytes {
        return Err(CodecError::InvalidInput(format!(
            "stride {stride} shorter than row of {row_bytes} bytes"
        )));
    }
    let needed = stride
        .checked_mul(height as usize - 1)
        .and_then(|n| n.checked_add(row_bytes))
        .ok_or_else(|| CodecError::InvalidInput("buffer size overflows".into()))?;
    if len < needed {
        return Err(CodecError::InvalidInput(format!(
            "buffer holds {len} bytes, {width}x{height} {format:?} needs {needed}"
        )));
    }
    Ok(())
}

/// Read access to a platform bitmap.
pub trait PlatformBitmap {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Color space the pixel values are expressed in.
    fn color_space(&self) -> ColorSpace;
    fn pixel_format(&self) -> PixelFormat;
    /// Row pitch of [`pixels`](Self::pixels) in bytes.
    fn stride(&self) -> usize;
    /// Pixel storage, at least `stride * (height - 1) + width * bpp` bytes.
    fn pixels(&self) -> &[u8];
}

/// Construction of a platform bitmap from a decoded buffer.
pub trait FromRawPlanes: Sized {
    /// Whether this bitmap type can host pixels in `format`.
    fn accepts(format: PixelFormat) -> bool;

    /// Adopt `buffer`'s storage. Only called with formats [`accepts`]
    /// returned true for.
    ///
    /// [`accepts`]: FromRawPlanes::accepts
    fn from_raw_planes(buffer: RawPlaneBuffer, color_space: ColorSpace)
    -> Result<Self, CodecError>;
}

/// Owned bitmap with any [`PixelFormat`] and a color space tag.
#[derive(Clone, Debug)]
pub struct Bitmap {
    buffer: RawPlaneBuffer,
    color_space: ColorSpace,
}

impl Bitmap {
    /// Tightly packed bitmap in `format`, tagged device RGB.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            buffer: RawPlaneBuffer::packed(width, height, format, data)?,
            color_space: ColorSpace::device_rgb(),
        })
    }

    /// Bitmap over an existing buffer.
    pub fn from_buffer(buffer: RawPlaneBuffer, color_space: ColorSpace) -> Self {
        Self {
            buffer,
            color_space,
        }
    }

    /// Straight RGBA bitmap from a typed image.
    pub fn from_rgba8(img: ImgRef<'_, RGBA8>) -> Self {
        Self::from_buffer(RawPlaneBuffer::from_rgba(img), ColorSpace::device_rgb())
    }

    /// Opaque RGB bitmap from a typed image.
    pub fn from_rgb8(img: ImgRef<'_, RGB8>) -> Self {
        let mut data = Vec::with_capacity(img.width() * img.height() * 3);
        for row in img.rows() {
            data.extend_from_slice(bytemuck::cast_slice(row));
        }
        let buffer = RawPlaneBuffer {
            width: img.width() as u32,
            height: img.height() as u32,
            stride: img.width() * 3,
            format: PixelFormat::Rgb8,
            data,
        };
        Self::from_buffer(buffer, ColorSpace::device_rgb())
    }

    /// Replace the color space tag.
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn buffer(&self) -> &RawPlaneBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> RawPlaneBuffer {
        self.buffer
    }

    /// Copy out as a packed straight-RGBA image.
    pub fn to_rgba8(&self) -> Result<ImgVec<RGBA8>, CodecError> {
        let bridged = crate::bridge::to_raw_planes(self)?;
        let width = bridged.buffer.width() as usize;
        let height = bridged.buffer.height() as usize;
        let pixels: Vec<RGBA8> = bytemuck::cast_slice(bridged.buffer.data()).to_vec();
        Ok(ImgVec::new(pixels, width, height))
    }
}

impl PlatformBitmap for Bitmap {
    fn width(&self) -> u32 {
        self.buffer.width
    }

    fn height(&self) -> u32 {
        self.buffer.height
    }

    fn color_space(&self) -> ColorSpace {
        self.color_space.clone()
    }

    fn pixel_format(&self) -> PixelFormat {
        self.buffer.format
    }

    fn stride(&self) -> usize {
        self.buffer.stride
    }

    fn pixels(&self) -> &[u8] {
        &self.buffer.data
    }
}

impl FromRawPlanes for Bitmap {
    fn accepts(_format: PixelFormat) -> bool {
        true
    }

    fn from_raw_planes(
        buffer: RawPlaneBuffer,
        color_space: ColorSpace,
    ) -> Result<Self, CodecError> {
        Ok(Self::from_buffer(buffer, color_space))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_stride() {
        let buf = RawPlaneBuffer::packed(3, 2, PixelFormat::Rgb8, vec![0; 18]).unwrap();
        assert_eq!(buf.stride(), 9);
        assert_eq!(buf.row(1).map(<[u8]>::len), Some(9));
        assert_eq!(buf.row(2), None);
    }

    #[test]
    fn short_buffer_rejected() {
        let err = RawPlaneBuffer::packed(4, 4, PixelFormat::Rgba8, vec![0; 63]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput(_)));
    }

    #[test]
    fn last_row_needs_no_padding() {
        // stride 20, 2 rows of 4 RGBA pixels: 20 + 16 bytes
        let buf = RawPlaneBuffer::new(4, 2, 20, PixelFormat::Rgba8, vec![0; 36]).unwrap();
        assert_eq!(buf.row(1).map(<[u8]>::len), Some(16));
        assert_eq!(buf.row(2), None);
        assert_eq!(buf.row(u32::MAX), None);
    }

    #[test]
    fn stride_shorter_than_row_rejected() {
        let err = RawPlaneBuffer::new(4, 1, 12, PixelFormat::Rgba8, vec![0; 16]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput(_)));
    }

    #[test]
    fn zero_size_rejected() {
        assert!(RawPlaneBuffer::packed(0, 4, PixelFormat::Rgba8, vec![]).is_err());
    }

    #[test]
    fn rgba_view_respects_stride() {
        let mut data = vec![0u8; 24];
        data[12..16].copy_from_slice(&[1, 2, 3, 4]);
        let buf = RawPlaneBuffer::new(2, 2, 12, PixelFormat::Rgba8, data).unwrap();
        let img = buf.as_rgba().unwrap();
        assert_eq!(img.stride(), 3);
        assert_eq!(img[(0usize, 1usize)], RGBA8::new(1, 2, 3, 4));
    }

    #[test]
    fn rgba_view_rejects_rgb() {
        let buf = RawPlaneBuffer::packed(1, 1, PixelFormat::Rgb8, vec![0; 3]).unwrap();
        assert!(buf.as_rgba().is_none());
    }

    #[test]
    fn format_flags() {
        assert!(!PixelFormat::Rgbx8.has_alpha_channel());
        assert!(PixelFormat::Bgra8Premultiplied.is_premultiplied());
        assert!(PixelFormat::Bgra8Premultiplied.is_bgr_order());
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
    }

    #[test]
    fn bitmap_from_rgb8() {
        let img = ImgVec::new(vec![RGB8::new(10, 20, 30); 6], 3, 2);
        let bmp = Bitmap::from_rgb8(img.as_ref());
        assert_eq!(bmp.width(), 3);
        assert_eq!(bmp.pixel_format(), PixelFormat::Rgb8);
        assert_eq!(&bmp.pixels()[..3], &[10, 20, 30]);
        assert!(bmp.color_space().is_device_rgb());
    }
}

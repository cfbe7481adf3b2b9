//! Conversion between platform bitmaps and codec-facing pixel buffers.
//!
//! The encoder side always sees tightly packed, straight-alpha RGBA8. The
//! decoder side hands a buffer in whichever layout the target bitmap type
//! accepts, preferring layouts libwebp can emit directly.

use rgb::alt::BGRA;
use rgb::{RGB8, RGBA8};

use crate::CodecError;
use crate::bitmap::{
    FromRawPlanes, PixelFormat, PlatformBitmap, RawPlaneBuffer, validate_geometry,
};
use crate::color::ColorSpace;

/// Packed straight RGBA8 pixels read from a bitmap.
#[derive(Clone, Debug)]
pub struct BridgedPixels {
    pub buffer: RawPlaneBuffer,
    /// At least one pixel is not fully opaque.
    pub has_alpha: bool,
}

/// Read `bitmap` into packed straight RGBA8.
///
/// Premultiplied input is unpremultiplied and BGR order is swapped. Layouts
/// without an alpha channel get an opaque one and report `has_alpha = false`
/// without scanning; the rest are scanned for non-opaque pixels.
pub fn to_raw_planes<B: PlatformBitmap + ?Sized>(bitmap: &B) -> Result<BridgedPixels, CodecError> {
    let width = bitmap.width();
    let height = bitmap.height();
    let stride = bitmap.stride();
    let format = bitmap.pixel_format();
    let pixels = bitmap.pixels();
    validate_geometry(width, height, stride, format, pixels.len())?;

    let row_bytes = width as usize * format.bytes_per_pixel();
    let mut out: Vec<RGBA8> = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as usize {
        let row = &pixels[y * stride..y * stride + row_bytes];
        match format {
            PixelFormat::Rgb8 => {
                let row: &[RGB8] = bytemuck::cast_slice(row);
                out.extend(row.iter().map(|p| RGBA8::new(p.r, p.g, p.b, 255)));
            }
            f if f.is_bgr_order() => {
                let row: &[BGRA<u8>] = bytemuck::cast_slice(row);
                let rgba = row.iter().map(|p| RGBA8::new(p.r, p.g, p.b, p.a));
                out.extend(rgba.map(|p| to_straight_rgba(p, f)));
            }
            f => {
                let row: &[RGBA8] = bytemuck::cast_slice(row);
                out.extend(row.iter().map(|&p| to_straight_rgba(p, f)));
            }
        }
    }

    let has_alpha = format.has_alpha_channel() && out.iter().any(|p| p.a < 255);
    let buffer =
        RawPlaneBuffer::packed(width, height, PixelFormat::Rgba8, bytemuck::cast_vec(out))?;
    Ok(BridgedPixels { buffer, has_alpha })
}

fn to_straight_rgba(p: RGBA8, format: PixelFormat) -> RGBA8 {
    match format {
        PixelFormat::Rgbx8 => RGBA8 { a: 255, ..p },
        f if f.is_premultiplied() => unpremultiply(p),
        _ => p,
    }
}

fn unpremultiply(p: RGBA8) -> RGBA8 {
    match p.a {
        0 => RGBA8::new(0, 0, 0, 0),
        255 => p,
        a => {
            let a16 = a as u16;
            let channel = |c: u8| ((c as u16 * 255 + a16 / 2) / a16).min(255) as u8;
            RGBA8::new(channel(p.r), channel(p.g), channel(p.b), a)
        }
    }
}

fn premultiply(p: RGBA8) -> RGBA8 {
    let a = p.a as u16;
    let channel = |c: u8| ((c as u16 * a + 127) / 255) as u8;
    RGBA8::new(channel(p.r), channel(p.g), channel(p.b), p.a)
}

/// Hand `buffer` to a new `B`, moving its storage.
pub fn from_raw_planes<B: FromRawPlanes>(
    buffer: RawPlaneBuffer,
    color_space: ColorSpace,
) -> Result<B, CodecError> {
    if !B::accepts(buffer.format()) {
        return Err(CodecError::UnsupportedPixelFormat(buffer.format()));
    }
    B::from_raw_planes(buffer, color_space)
}

// Layouts libwebp decodes into directly, best first.
const DECODE_PREFERENCE: [PixelFormat; 6] = [
    PixelFormat::Rgba8,
    PixelFormat::Rgba8Premultiplied,
    PixelFormat::Bgra8,
    PixelFormat::Bgra8Premultiplied,
    PixelFormat::Rgbx8,
    PixelFormat::Rgb8,
];

/// First layout `B` accepts, in decode preference order.
pub fn decode_format_for<B: FromRawPlanes>() -> Result<PixelFormat, CodecError> {
    DECODE_PREFERENCE
        .into_iter()
        .find(|&f| B::accepts(f))
        .ok_or(CodecError::UnsupportedPixelFormat(PixelFormat::Rgba8))
}

/// Repack a straight-RGBA buffer into `format`.
pub fn convert_rgba(
    buffer: RawPlaneBuffer,
    format: PixelFormat,
) -> Result<RawPlaneBuffer, CodecError> {
    if format == PixelFormat::Rgba8 {
        return Ok(buffer);
    }
    let src = buffer
        .as_rgba()
        .filter(|_| buffer.format() == PixelFormat::Rgba8)
        .ok_or(CodecError::UnsupportedPixelFormat(buffer.format()))?;

    let mut data = Vec::with_capacity(src.width() * src.height() * format.bytes_per_pixel());
    for row in src.rows() {
        for &p in row {
            let p = if format.is_premultiplied() {
                premultiply(p)
            } else {
                p
            };
            match format {
                PixelFormat::Rgb8 => data.extend_from_slice(&[p.r, p.g, p.b]),
                PixelFormat::Rgbx8 => data.extend_from_slice(&[p.r, p.g, p.b, 255]),
                f if f.is_bgr_order() => {
                    let bgra = BGRA {
                        b: p.b,
                        g: p.g,
                        r: p.r,
                        a: p.a,
                    };
                    data.extend_from_slice(bytemuck::bytes_of(&bgra));
                }
                _ => data.extend_from_slice(bytemuck::bytes_of(&p)),
            }
        }
    }
    RawPlaneBuffer::packed(buffer.width(), buffer.height(), format, data)
}

/// Convert a straight-RGBA buffer into whatever `B` accepts and adopt it.
pub fn adopt_rgba<B: FromRawPlanes>(
    buffer: RawPlaneBuffer,
    color_space: ColorSpace,
) -> Result<B, CodecError> {
    let format = decode_format_for::<B>()?;
    from_raw_planes(convert_rgba(buffer, format)?, color_space)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;

    struct BgraOnly(RawPlaneBuffer);

    impl FromRawPlanes for BgraOnly {
        fn accepts(format: PixelFormat) -> bool {
            format == PixelFormat::Bgra8Premultiplied
        }

        fn from_raw_planes(buffer: RawPlaneBuffer, _: ColorSpace) -> Result<Self, CodecError> {
            Ok(BgraOnly(buffer))
        }
    }

    struct Nothing;

    impl FromRawPlanes for Nothing {
        fn accepts(_: PixelFormat) -> bool {
            false
        }

        fn from_raw_planes(_: RawPlaneBuffer, _: ColorSpace) -> Result<Self, CodecError> {
            Ok(Nothing)
        }
    }

    #[test]
    fn rgb_input_is_opaque() {
        let bmp = Bitmap::new(2, 1, PixelFormat::Rgb8, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let out = to_raw_planes(&bmp).unwrap();
        assert!(!out.has_alpha);
        assert_eq!(out.buffer.data(), &[1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn rgbx_filler_ignored() {
        let bmp = Bitmap::new(1, 1, PixelFormat::Rgbx8, vec![9, 8, 7, 0]).unwrap();
        let out = to_raw_planes(&bmp).unwrap();
        assert!(!out.has_alpha);
        assert_eq!(out.buffer.data(), &[9, 8, 7, 255]);
    }

    #[test]
    fn opaque_rgba_reports_no_alpha() {
        let data = vec![1, 2, 3, 255, 4, 5, 6, 255];
        let bmp = Bitmap::new(1, 2, PixelFormat::Rgba8, data).unwrap();
        assert!(!to_raw_planes(&bmp).unwrap().has_alpha);
    }

    #[test]
    fn translucent_rgba_reports_alpha() {
        let data = vec![1, 2, 3, 255, 4, 5, 6, 254];
        let bmp = Bitmap::new(1, 2, PixelFormat::Rgba8, data).unwrap();
        assert!(to_raw_planes(&bmp).unwrap().has_alpha);
    }

    #[test]
    fn bgra_premultiplied_unpacks() {
        // straight (200, 100, 50) at alpha 128, premultiplied and BGR ordered
        let data = vec![25, 50, 100, 128];
        let bmp = Bitmap::new(1, 1, PixelFormat::Bgra8Premultiplied, data).unwrap();
        let out = to_raw_planes(&bmp).unwrap();
        assert!(out.has_alpha);
        assert_eq!(out.buffer.data(), &[199, 100, 50, 128]);
    }

    #[test]
    fn padded_stride_is_packed() {
        let data = vec![1, 2, 3, 255, 0xEE, 0xEE, 0xEE, 0xEE, 4, 5, 6, 255];
        let buffer = RawPlaneBuffer::new(1, 2, 8, PixelFormat::Rgba8, data).unwrap();
        let bmp = Bitmap::from_buffer(buffer, ColorSpace::device_rgb());
        let out = to_raw_planes(&bmp).unwrap();
        assert_eq!(out.buffer.stride(), 4);
        assert_eq!(out.buffer.data(), &[1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn unaccepted_format_rejected() {
        let buffer = RawPlaneBuffer::packed(1, 1, PixelFormat::Rgba8, vec![0; 4]).unwrap();
        let result = from_raw_planes::<BgraOnly>(buffer, ColorSpace::device_rgb());
        let err = result.err().unwrap();
        assert!(matches!(err, CodecError::UnsupportedPixelFormat(PixelFormat::Rgba8)));
    }

    #[test]
    fn decode_format_preference() {
        assert_eq!(decode_format_for::<Bitmap>().unwrap(), PixelFormat::Rgba8);
        assert_eq!(
            decode_format_for::<BgraOnly>().unwrap(),
            PixelFormat::Bgra8Premultiplied
        );
        assert!(decode_format_for::<Nothing>().is_err());
    }

    #[test]
    fn adopt_converts_to_accepted_layout() {
        let data = vec![200, 100, 50, 128];
        let buffer = RawPlaneBuffer::packed(1, 1, PixelFormat::Rgba8, data).unwrap();
        let BgraOnly(out) = adopt_rgba::<BgraOnly>(buffer, ColorSpace::device_rgb()).unwrap();
        assert_eq!(out.format(), PixelFormat::Bgra8Premultiplied);
        assert_eq!(out.data(), &[25, 50, 100, 128]);
    }

    #[test]
    fn convert_to_rgb_drops_alpha() {
        let buffer = RawPlaneBuffer::packed(1, 1, PixelFormat::Rgba8, vec![1, 2, 3, 4]).unwrap();
        let out = convert_rgba(buffer, PixelFormat::Rgb8).unwrap();
        assert_eq!(out.data(), &[1, 2, 3]);
    }

    #[test]
    fn straight_bgra_swaps_both_ways() {
        let bmp = Bitmap::new(1, 1, PixelFormat::Bgra8, vec![30, 20, 10, 200]).unwrap();
        let out = to_raw_planes(&bmp).unwrap();
        assert_eq!(out.buffer.data(), &[10, 20, 30, 200]);
        let back = convert_rgba(out.buffer, PixelFormat::Bgra8).unwrap();
        assert_eq!(back.data(), &[30, 20, 10, 200]);
    }

    #[test]
    fn short_pixels_rejected() {
        struct Liar;
        impl PlatformBitmap for Liar {
            fn width(&self) -> u32 {
                10
            }
            fn height(&self) -> u32 {
                10
            }
            fn color_space(&self) -> ColorSpace {
                ColorSpace::device_rgb()
            }
            fn pixel_format(&self) -> PixelFormat {
                PixelFormat::Rgba8
            }
            fn stride(&self) -> usize {
                40
            }
            fn pixels(&self) -> &[u8] {
                &[0; 16]
            }
        }
        assert!(matches!(to_raw_planes(&Liar), Err(CodecError::InvalidInput(_))));
    }
}

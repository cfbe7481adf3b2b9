//! Animated WebP assembly and disassembly.
//!
//! Encoding turns a sequence of timed bitmaps into one animated container:
//! each bitmap is encoded as a still image and pushed as a full frame at the
//! canvas origin. Decoding demuxes the container and composites every frame
//! onto the canvas, honoring each frame's blend and dispose methods, so every
//! yielded frame is a complete picture.
//!
//! Frame durations travel at millisecond resolution; anything below a
//! millisecond is truncated on encode.

use core::time::Duration;

use rgb::RGBA8;

use crate::bitmap::{FromRawPlanes, PixelFormat, PlatformBitmap, RawPlaneBuffer};
use crate::color::{ColorSpace, resolve_decode_color_space};
use crate::config::EncoderConfig;
use crate::encode::encode_still;
use crate::info::loop_count_from;
use crate::limits::Limits;
use crate::native::decode::decode_into;
use crate::native::demux::{DemuxFrame, Demuxer};
use crate::native::mux::Mux;
use crate::probe::is_webp;
use crate::scale::{Size, compute_target_size, resample_rgba};
use crate::{CodecError, bridge};

/// Largest frame duration the container can store (24 bits of milliseconds).
pub const MAX_FRAME_DURATION: Duration = Duration::from_millis((1 << 24) - 1);

// libwebp's default ANIM background: opaque white.
const DEFAULT_BACKGROUND: u32 = 0xFFFF_FFFF;

/// A bitmap and how long it stays on screen.
#[derive(Clone, Debug)]
pub struct AnimationFrame<B> {
    pub bitmap: B,
    pub duration: Duration,
}

impl<B> AnimationFrame<B> {
    pub fn new(bitmap: B, duration: Duration) -> Self {
        Self { bitmap, duration }
    }
}

/// Fully composited frames of a decoded container.
#[derive(Clone, Debug)]
pub struct DecodedAnimation<B> {
    pub frames: Vec<AnimationFrame<B>>,
    /// Loop count (0 = forever); `None` when the container is not animated.
    pub loop_count: Option<u16>,
    /// Canvas size of the container, before any display scaling.
    pub canvas: Size,
}

fn duration_ms(duration: Duration) -> Result<u32, CodecError> {
    if duration > MAX_FRAME_DURATION {
        return Err(CodecError::invalid_parameter(
            "frame duration",
            format_args!("{duration:?}"),
            "0..=16777215 ms",
        ));
    }
    Ok(duration.as_millis() as u32)
}

/// Encode `frames` as an animation that plays `loop_count` times (0 = forever).
///
/// The canvas is as large as the largest frame. An ICC profile on the first
/// frame's bitmap is embedded for the whole animation.
///
/// A single frame that fills the canvas is stored as a still image, so both
/// the loop count and that frame's duration are dropped. Decoding such a file
/// reports no loop count and a zero duration.
pub fn encode_animation<B: PlatformBitmap>(
    frames: &[AnimationFrame<B>],
    loop_count: u16,
    config: &EncoderConfig,
) -> Result<Vec<u8>, CodecError> {
    let Some(first) = frames.first() else {
        return Err(CodecError::InvalidInput("animation has no frames".into()));
    };
    let durations = frames
        .iter()
        .map(|f| duration_ms(f.duration))
        .collect::<Result<Vec<_>, _>>()?;

    let native = crate::native::encode::webp_config(config)?;
    let mut mux = Mux::new()?;
    let mut canvas = Size::ZERO;
    for (frame, &ms) in frames.iter().zip(&durations) {
        let still = encode_still(&frame.bitmap, config, &native)?;
        canvas.width = canvas.width.max(still.size.width);
        canvas.height = canvas.height.max(still.size.height);
        mux.push_frame(&still.bytes, ms)?;
    }

    mux.set_canvas_size(canvas)?;
    mux.set_animation_params(DEFAULT_BACKGROUND, loop_count)?;
    if let Some(icc) = first.bitmap.color_space().icc_profile() {
        mux.set_icc_profile(icc.as_bytes())?;
    }
    let bytes = mux.assemble()?;

    tracing::debug!(
        frames = frames.len(),
        canvas_width = canvas.width,
        canvas_height = canvas.height,
        loop_count,
        bytes = bytes.len(),
        "assembled animation"
    );
    Ok(bytes)
}

/// Decode every frame of `data` at canvas size.
pub fn decode_animation<B: FromRawPlanes>(data: &[u8]) -> Result<DecodedAnimation<B>, CodecError> {
    AnimationDecodeRequest::new(data).decode()
}

/// Animation decode request builder.
///
/// # Example
///
/// ```no_run
/// use zenwebpkit::animation::AnimationDecodeRequest;
/// use zenwebpkit::Bitmap;
///
/// let data: &[u8] = &[]; // your animated WebP bytes
/// let animation = AnimationDecodeRequest::new(data)
///     .with_max_display_size(256)
///     .decode::<Bitmap>()?;
/// println!("{} frames, loop {:?}", animation.frames.len(), animation.loop_count);
/// # Ok::<(), zenwebpkit::CodecError>(())
/// ```
pub struct AnimationDecodeRequest<'a> {
    data: &'a [u8],
    display_size: Size,
    scale_factor: f64,
    limits: Option<&'a Limits>,
}

impl<'a> AnimationDecodeRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            display_size: Size::ZERO,
            scale_factor: 1.0,
            limits: None,
        }
    }

    /// Fit every frame into a `side × side` box. Zero decodes at canvas size.
    pub fn with_max_display_size(self, side: u32) -> Self {
        self.with_display_size(Size::square(side))
    }

    /// Fit every frame into `size`. A zero component decodes at canvas size.
    pub fn with_display_size(mut self, size: Size) -> Self {
        self.display_size = size;
        self
    }

    /// Multiply the display box by this factor (e.g. a screen's pixel density).
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn decode<B: FromRawPlanes>(self) -> Result<DecodedAnimation<B>, CodecError> {
        if !is_webp(self.data) {
            return Err(CodecError::NotRecognizedFormat);
        }
        let default_limits = Limits::none();
        let limits = self.limits.unwrap_or(&default_limits);

        let mut compositor = Compositor::new(self.data, limits)?;
        let canvas = compositor.canvas;
        let loop_count = compositor.loop_count;
        let target = compute_target_size(canvas, self.display_size, self.scale_factor);
        let color_space = compositor.color_space.clone();

        let mut frames = Vec::with_capacity(compositor.frames.len());
        while let Some((buffer, duration)) = compositor.next_frame()? {
            let buffer = resample_rgba(buffer, target)?;
            let bitmap = bridge::adopt_rgba::<B>(buffer, color_space.clone())?;
            frames.push(AnimationFrame::new(bitmap, duration));
        }
        Ok(DecodedAnimation {
            frames,
            loop_count,
            canvas,
        })
    }
}

/// Replays a container's frames onto a straight-alpha RGBA canvas.
pub(crate) struct Compositor<'a> {
    frames: Vec<DemuxFrame<'a>>,
    next: usize,
    canvas: Size,
    pixels: Vec<RGBA8>,
    // Rectangle to clear before drawing the next frame.
    pending_dispose: Option<(u32, u32, Size)>,
    pub loop_count: Option<u16>,
    pub color_space: ColorSpace,
}

impl<'a> Compositor<'a> {
    pub fn new(data: &'a [u8], limits: &Limits) -> Result<Self, CodecError> {
        let demux = Demuxer::new(data)?;
        let canvas = demux.canvas_size();
        limits.check_output(canvas, 4)?;
        let frames = demux.frames()?;
        limits.check_frames(frames.len() as u32)?;

        let loop_count = demux
            .is_animated()
            .then(|| loop_count_from(demux.loop_count()));
        let color_space = resolve_decode_color_space(demux.icc_profile().as_deref());

        tracing::debug!(
            frames = frames.len(),
            canvas_width = canvas.width,
            canvas_height = canvas.height,
            ?loop_count,
            "demuxed container"
        );
        Ok(Self {
            frames,
            next: 0,
            canvas,
            pixels: vec![RGBA8::new(0, 0, 0, 0); canvas.pixel_count() as usize],
            pending_dispose: None,
            loop_count,
            color_space,
        })
    }

    /// Composite the next frame and return a copy of the canvas.
    pub fn next_frame(&mut self) -> Result<Option<(RawPlaneBuffer, Duration)>, CodecError> {
        let Some(frame) = self.frames.get(self.next).copied() else {
            return Ok(None);
        };
        self.next += 1;

        if let Some((x, y, size)) = self.pending_dispose.take() {
            self.fill_rect(x, y, size, RGBA8::new(0, 0, 0, 0));
        }

        let decoded = decode_into(frame.fragment, frame.size, frame.size, PixelFormat::Rgba8)?;
        let src = decoded
            .as_rgba()
            .ok_or(CodecError::UnsupportedPixelFormat(decoded.format()))?;

        let canvas_w = self.canvas.width as usize;
        let x0 = frame.x_offset as usize;
        let y0 = frame.y_offset as usize;
        let w = src.width().min(canvas_w.saturating_sub(x0));
        for (dy, row) in src.rows().enumerate().take_while(|_| w > 0) {
            let y = y0 + dy;
            if y >= self.canvas.height as usize {
                break;
            }
            let dst = &mut self.pixels[y * canvas_w + x0..y * canvas_w + x0 + w];
            for (d, &s) in dst.iter_mut().zip(&row[..w]) {
                *d = if frame.blend { blend(s, *d) } else { s };
            }
        }

        if frame.dispose_to_background {
            self.pending_dispose = Some((frame.x_offset, frame.y_offset, frame.size));
        }

        let snapshot =
            imgref::ImgVec::new(self.pixels.clone(), canvas_w, self.canvas.height as usize);
        let duration = Duration::from_millis(frame.duration_ms as u64);
        Ok(Some((RawPlaneBuffer::from_rgba(snapshot.as_ref()), duration)))
    }

    fn fill_rect(&mut self, x: u32, y: u32, size: Size, color: RGBA8) {
        let canvas_w = self.canvas.width as usize;
        let x0 = (x as usize).min(canvas_w);
        let x1 = (x as usize + size.width as usize).min(canvas_w);
        let y1 = (y as usize + size.height as usize).min(self.canvas.height as usize);
        for row in (y as usize)..y1 {
            self.pixels[row * canvas_w + x0..row * canvas_w + x1].fill(color);
        }
    }
}

/// Source-over blend of straight-alpha pixels.
fn blend(src: RGBA8, dst: RGBA8) -> RGBA8 {
    let src_a = src.a as u32;
    if src_a == 255 {
        return src;
    }
    if src_a == 0 {
        return dst;
    }
    let dst_factor_a = (dst.a as u32 * (256 - src_a)) >> 8;
    let blend_a = src_a + dst_factor_a;
    let scale = (1u32 << 24) / blend_a;
    let channel = |s: u8, d: u8| {
        let unscaled = s as u32 * src_a + d as u32 * dst_factor_a;
        ((unscaled * scale) >> 24) as u8
    };
    RGBA8::new(
        channel(src.r, dst.r),
        channel(src.g, dst.g),
        channel(src.b, dst.b),
        blend_a as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::config::EncoderConfigBuilder;

    fn solid(width: u32, height: u32, px: [u8; 4]) -> Bitmap {
        let data = px.repeat((width * height) as usize);
        Bitmap::new(width, height, PixelFormat::Rgba8, data).unwrap()
    }

    #[test]
    fn empty_sequence_rejected() {
        let frames: Vec<AnimationFrame<Bitmap>> = Vec::new();
        let err = encode_animation(&frames, 0, &EncoderConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidInput(_)));
    }

    #[test]
    fn overlong_duration_rejected() {
        let frames = vec![
            AnimationFrame::new(solid(4, 4, [255, 0, 0, 255]), Duration::from_millis(10)),
            AnimationFrame::new(solid(4, 4, [0, 255, 0, 255]), Duration::from_secs(20_000)),
        ];
        let err = encode_animation(&frames, 0, &EncoderConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidParameter { .. }));
    }

    #[test]
    fn duration_truncates_to_millis() {
        assert_eq!(duration_ms(Duration::from_micros(1_999)).unwrap(), 1);
        assert_eq!(duration_ms(Duration::ZERO).unwrap(), 0);
        assert_eq!(duration_ms(MAX_FRAME_DURATION).unwrap(), (1 << 24) - 1);
    }

    #[test]
    fn blend_extremes() {
        let dst = RGBA8::new(10, 20, 30, 255);
        let opaque = RGBA8::new(1, 2, 3, 255);
        assert_eq!(blend(opaque, dst), opaque);
        assert_eq!(blend(RGBA8::new(1, 2, 3, 0), dst), dst);
    }

    #[test]
    fn blend_half_over_opaque() {
        let out = blend(RGBA8::new(255, 0, 0, 128), RGBA8::new(0, 0, 255, 255));
        assert_eq!(out.a, 255);
        assert!((126..=129).contains(&out.r), "{out:?}");
        assert!((126..=129).contains(&out.b), "{out:?}");
    }

    #[test]
    fn blend_onto_transparent_keeps_source() {
        let src = RGBA8::new(200, 100, 50, 77);
        let out = blend(src, RGBA8::new(0, 0, 0, 0));
        assert_eq!(out.a, 77);
        assert!((199..=200).contains(&out.r), "{out:?}");
    }

    #[test]
    fn frames_keep_order_and_timing() {
        let config = EncoderConfigBuilder::from_quality(100.0).unwrap().build();
        let colors = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]];
        let frames: Vec<_> = colors
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let duration = Duration::from_millis(40 * (i as u64 + 1));
                AnimationFrame::new(solid(16, 16, c), duration)
            })
            .collect();
        let bytes = encode_animation(&frames, 3, &config).unwrap();

        let decoded = decode_animation::<Bitmap>(&bytes).unwrap();
        assert_eq!(decoded.loop_count, Some(3));
        assert_eq!(decoded.canvas, Size::square(16));
        assert_eq!(decoded.frames.len(), 3);
        for (i, frame) in decoded.frames.iter().enumerate() {
            assert_eq!(frame.duration, Duration::from_millis(40 * (i as u64 + 1)));
            let px = frame.bitmap.to_rgba8().unwrap().buf()[0];
            let want = colors[i];
            for (got, want) in [px.r, px.g, px.b].into_iter().zip(want) {
                assert!(got.abs_diff(want) <= 8, "frame {i}: {px:?}");
            }
        }
    }

    #[test]
    fn mixed_frame_sizes_use_largest_canvas() {
        let frames = vec![
            AnimationFrame::new(solid(10, 6, [255, 0, 0, 255]), Duration::from_millis(50)),
            AnimationFrame::new(solid(4, 12, [0, 0, 255, 255]), Duration::from_millis(50)),
        ];
        let bytes = encode_animation(&frames, 0, &EncoderConfig::default()).unwrap();
        let decoded = decode_animation::<Bitmap>(&bytes).unwrap();
        assert_eq!(decoded.canvas, Size::new(10, 12));
        for frame in &decoded.frames {
            assert_eq!((frame.bitmap.width(), frame.bitmap.height()), (10, 12));
        }
        // First frame was disposed to transparent before the second was drawn.
        let second = decoded.frames[1].bitmap.to_rgba8().unwrap();
        assert_eq!(second[(9usize, 0usize)].a, 0);
    }

    #[test]
    fn display_size_scales_frames() {
        let frames = vec![
            AnimationFrame::new(solid(64, 32, [255, 0, 0, 255]), Duration::from_millis(50)),
            AnimationFrame::new(solid(64, 32, [0, 255, 0, 255]), Duration::from_millis(50)),
        ];
        let bytes = encode_animation(&frames, 0, &EncoderConfig::default()).unwrap();
        let decoded = AnimationDecodeRequest::new(&bytes)
            .with_max_display_size(16)
            .decode::<Bitmap>()
            .unwrap();
        assert_eq!(decoded.canvas, Size::new(64, 32));
        for frame in &decoded.frames {
            assert_eq!((frame.bitmap.width(), frame.bitmap.height()), (16, 8));
        }
    }

    #[test]
    fn frame_limit_enforced() {
        let frames = vec![
            AnimationFrame::new(solid(8, 8, [255, 0, 0, 255]), Duration::from_millis(50)),
            AnimationFrame::new(solid(8, 8, [0, 255, 0, 255]), Duration::from_millis(50)),
        ];
        let bytes = encode_animation(&frames, 0, &EncoderConfig::default()).unwrap();
        let limits = Limits {
            max_frames: Some(1),
            ..Default::default()
        };
        let err = AnimationDecodeRequest::new(&bytes)
            .with_limits(&limits)
            .decode::<Bitmap>()
            .unwrap_err();
        assert!(matches!(err, CodecError::LimitExceeded(_)));
    }

    #[test]
    fn still_image_is_one_frame_without_loop_count() {
        let bitmap = solid(8, 8, [9, 9, 9, 255]);
        let still = crate::encode::encode(&bitmap, &EncoderConfig::default()).unwrap();
        let decoded = decode_animation::<Bitmap>(&still).unwrap();
        assert_eq!(decoded.loop_count, None);
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!(decoded.frames[0].duration, Duration::ZERO);
    }

    #[test]
    fn single_full_frame_drops_loop_and_duration() {
        let bitmap = solid(8, 8, [200, 10, 10, 255]);
        let frames = vec![AnimationFrame::new(bitmap, Duration::from_millis(40))];
        let bytes = encode_animation(&frames, 5, &EncoderConfig::default()).unwrap();
        let decoded = decode_animation::<Bitmap>(&bytes).unwrap();
        assert_eq!(decoded.loop_count, None);
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!(decoded.frames[0].duration, Duration::ZERO);
        assert_eq!(decoded.canvas, Size::square(8));
    }

    #[test]
    fn not_webp_rejected() {
        assert!(matches!(
            decode_animation::<Bitmap>(b"GIF89a"),
            Err(CodecError::NotRecognizedFormat)
        ));
    }
}

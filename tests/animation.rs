//! Animated container assembly and disassembly through the public API.

use std::time::Duration;

use zenwebpkit::{
    AnimationDecodeRequest, AnimationFrame, Bitmap, CodecError, DecodeRequest,
    EncoderConfigBuilder, PixelFormat, PlatformBitmap, Size, decode_animation, encode_animation,
    info,
};

fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Bitmap {
    let data = [rgb[0], rgb[1], rgb[2], 255].repeat((width * height) as usize);
    Bitmap::new(width, height, PixelFormat::Rgba8, data).unwrap()
}

fn three_frames() -> Vec<AnimationFrame<Bitmap>> {
    vec![
        AnimationFrame::new(solid(32, 24, [250, 10, 10]), Duration::from_millis(100)),
        AnimationFrame::new(solid(32, 24, [10, 250, 10]), Duration::from_millis(250)),
        AnimationFrame::new(solid(32, 24, [10, 10, 250]), Duration::from_millis(70)),
    ]
}

fn config() -> zenwebpkit::EncoderConfig {
    EncoderConfigBuilder::from_quality(90.0).unwrap().build()
}

#[test]
fn infinite_loop_stays_zero() {
    let bytes = encode_animation(&three_frames(), 0, &config()).unwrap();
    let decoded = decode_animation::<Bitmap>(&bytes).unwrap();
    assert_eq!(decoded.loop_count, Some(0));
    assert_eq!(decoded.frames.len(), 3);
}

#[test]
fn finite_loop_count_round_trips() {
    let bytes = encode_animation(&three_frames(), 5, &config()).unwrap();
    let decoded = decode_animation::<Bitmap>(&bytes).unwrap();
    assert_eq!(decoded.loop_count, Some(5));

    let meta = info::from_bytes(&bytes).unwrap();
    assert!(meta.has_animation);
    assert_eq!(meta.frame_count, 3);
    assert_eq!(meta.loop_count, Some(5));
    assert_eq!(meta.size(), Size::new(32, 24));
}

#[test]
fn frame_order_and_durations_survive() {
    let bytes = encode_animation(&three_frames(), 0, &config()).unwrap();
    let decoded = decode_animation::<Bitmap>(&bytes).unwrap();

    let durations: Vec<_> = decoded.frames.iter().map(|f| f.duration).collect();
    assert_eq!(
        durations,
        [100, 250, 70].map(Duration::from_millis).to_vec()
    );

    let dominant: Vec<usize> = decoded
        .frames
        .iter()
        .map(|f| {
            let px = f.bitmap.to_rgba8().unwrap().buf()[0];
            let channels = [px.r, px.g, px.b];
            (0..3).max_by_key(|&i| channels[i]).unwrap()
        })
        .collect();
    assert_eq!(dominant, [0, 1, 2]);
}

#[test]
fn sub_millisecond_durations_truncate() {
    let frames = vec![
        AnimationFrame::new(solid(8, 8, [255, 0, 0]), Duration::from_micros(33_999)),
        AnimationFrame::new(solid(8, 8, [0, 0, 255]), Duration::from_micros(500)),
    ];
    let bytes = encode_animation(&frames, 1, &config()).unwrap();
    let decoded = decode_animation::<Bitmap>(&bytes).unwrap();
    assert_eq!(decoded.frames[0].duration, Duration::from_millis(33));
    assert_eq!(decoded.frames[1].duration, Duration::ZERO);
}

#[test]
fn empty_sequence_is_an_error() {
    let err = encode_animation::<Bitmap>(&[], 0, &config()).unwrap_err();
    assert!(matches!(err, CodecError::InvalidInput(_)));
}

#[test]
fn still_image_decodes_as_single_frame() {
    let still = zenwebpkit::encode(&solid(12, 12, [1, 2, 3]), &config()).unwrap();
    let decoded = decode_animation::<Bitmap>(&still).unwrap();
    assert_eq!(decoded.loop_count, None);
    assert_eq!(decoded.frames.len(), 1);
    assert_eq!(decoded.frames[0].duration, Duration::ZERO);
    assert_eq!(decoded.canvas, Size::square(12));
}

#[test]
fn still_decode_returns_first_frame() {
    let bytes = encode_animation(&three_frames(), 2, &config()).unwrap();
    let image = DecodeRequest::new(&bytes)
        .with_max_display_size(16)
        .decode_raw(PixelFormat::Rgba8)
        .unwrap();
    assert_eq!(image.size(), Size::new(16, 12));
    assert_eq!(image.loop_count, Some(2));

    let bitmap = image.into_bitmap::<Bitmap>().unwrap();
    let px = bitmap.to_rgba8().unwrap().buf()[0];
    assert!(px.r > 200 && px.g < 60, "{px:?}");
}

#[test]
fn decoded_frames_scale_to_display_size() {
    let bytes = encode_animation(&three_frames(), 0, &config()).unwrap();
    let decoded = AnimationDecodeRequest::new(&bytes)
        .with_display_size(Size::new(8, 8))
        .with_scale_factor(2.0)
        .decode::<Bitmap>()
        .unwrap();
    for frame in &decoded.frames {
        assert_eq!((frame.bitmap.width(), frame.bitmap.height()), (16, 12));
    }
}

#[test]
fn pixel_cap_applies_per_frame() {
    let config = EncoderConfigBuilder::from_quality(80.0)
        .unwrap()
        .with_max_pixel_size(Size::square(16))
        .build();
    let bytes = encode_animation(&three_frames(), 0, &config).unwrap();
    let decoded = decode_animation::<Bitmap>(&bytes).unwrap();
    assert_eq!(decoded.canvas, Size::new(16, 12));
}

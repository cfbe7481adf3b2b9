//! # zenwebpkit
//!
//! WebP conversion between platform bitmaps and compressed bytes, backed by
//! libwebp.
//!
//! - Decode still images at full size or scaled into a display box.
//! - Encode with a quality or file-size target and fine-grained encoder knobs.
//! - Assemble and disassemble animations with per-frame durations.
//! - Carry ICC color profiles in both directions.
//!
//! Any bitmap type plugs in by implementing [`PlatformBitmap`] (encode side)
//! and [`FromRawPlanes`] (decode side). [`Bitmap`] is a ready-made owned one.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zenwebpkit::{Bitmap, EncoderConfigBuilder, Size};
//!
//! let data: &[u8] = &[]; // your WebP bytes
//! if zenwebpkit::is_supported_format(data) {
//!     // Decode into a 512×512 box
//!     let bitmap: Bitmap = zenwebpkit::decode(data, 512)?;
//!
//!     // Re-encode, capped at 256×256
//!     let config = EncoderConfigBuilder::from_quality(80.0)?
//!         .with_max_pixel_size(Size::square(256))
//!         .with_method(6)?
//!         .build();
//!     let webp = zenwebpkit::encode(&bitmap, &config)?;
//! }
//! # Ok::<(), zenwebpkit::CodecError>(())
//! ```
//!
//! Every entry point is re-entrant. Configs are immutable values, so one
//! [`EncoderConfig`] can be shared across threads.

#![deny(unsafe_code)]

pub mod animation;
mod bitmap;
pub mod bridge;
mod color;
mod config;
mod decode;
mod encode;
mod error;
mod format;
pub mod info;
mod limits;
#[allow(unsafe_code)]
mod native;
mod probe;
mod scale;

pub use animation::{
    AnimationDecodeRequest, AnimationFrame, DecodedAnimation, MAX_FRAME_DURATION, decode_animation,
    encode_animation,
};
pub use bitmap::{Bitmap, FromRawPlanes, PixelFormat, PlatformBitmap, RawPlaneBuffer};
pub use color::{ColorSpace, IccProfile, device_rgb};
pub use config::{
    AlphaFilter, ContentHint, DEFAULT_QUALITY, EncoderConfig, EncoderConfigBuilder, EncoderTarget,
    FilterType, Preset,
};
pub use decode::{DecodeRequest, DecodedImage, decode};
pub use encode::{EncodeRequest, encode};
pub use error::CodecError;
pub use format::ImageFormat;
pub use info::ImageInfo;
pub use limits::Limits;
pub use probe::{ProbeResult, WebpKind, is_supported_format, is_webp, probe};
pub use scale::{Size, compute_target_size};

//! Encoder configuration.
//!
//! [`EncoderConfigBuilder`] derives a complete encoder parameter set from one
//! of two high-level targets (perceptual quality or output file size), an
//! optional [`Preset`] and [`ContentHint`], and any number of low-level knobs.
//!
//! Builders are persistent values: every `with_*` call returns a new builder
//! and leaves the receiver untouched, so one base builder can seed several
//! configurations, including from different threads.
//!
//! Knobs that are never set stay `None` and leave the codec's preset value
//! untouched when the configuration is applied.
//!
//! # Example
//!
//! ```
//! use zenwebpkit::{EncoderConfigBuilder, Preset};
//!
//! let base = EncoderConfigBuilder::from_quality(80.0)?;
//! let fast = base.with_method(0)?.build();
//! let small = base.with_preset(Preset::Photo).with_method(6)?.with_passes(3)?.build();
//! assert_eq!(fast.method(), Some(0));
//! assert_eq!(small.passes(), Some(3));
//! assert_eq!(base.build().method(), None);
//! # Ok::<(), zenwebpkit::CodecError>(())
//! ```

use libwebp_sys::{WebPConfig, WebPImageHint, WebPPreset};

use crate::CodecError;
use crate::scale::Size;

/// What the encoder optimizes for. Exactly one target is active.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EncoderTarget {
    /// Perceptual quality, 0 (smallest) to 100 (best).
    Quality(f32),
    /// Desired output size in bytes; the codec searches for a matching quality.
    FileSize(u32),
}

/// Advisory description of the image content, forwarded to the codec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ContentHint {
    #[default]
    Default,
    /// Digital picture, such as an indoor portrait.
    Picture,
    /// Outdoor photograph with natural lighting.
    Photo,
    /// Discrete-tone graphic.
    Graph,
}

/// Baseline parameter set applied before any knob override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Preset {
    #[default]
    Default,
    Picture,
    Photo,
    Drawing,
    Icon,
    Text,
}

/// Deblocking filter type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterType {
    Simple,
    Strong,
}

/// Predictive filtering applied to the alpha plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlphaFilter {
    None,
    Fast,
    Best,
}

impl ContentHint {
    pub(crate) fn to_native(self) -> WebPImageHint {
        match self {
            ContentHint::Default => WebPImageHint::WEBP_HINT_DEFAULT,
            ContentHint::Picture => WebPImageHint::WEBP_HINT_PICTURE,
            ContentHint::Photo => WebPImageHint::WEBP_HINT_PHOTO,
            ContentHint::Graph => WebPImageHint::WEBP_HINT_GRAPH,
        }
    }
}

impl Preset {
    pub(crate) fn to_native(self) -> WebPPreset {
        match self {
            Preset::Default => WebPPreset::WEBP_PRESET_DEFAULT,
            Preset::Picture => WebPPreset::WEBP_PRESET_PICTURE,
            Preset::Photo => WebPPreset::WEBP_PRESET_PHOTO,
            Preset::Drawing => WebPPreset::WEBP_PRESET_DRAWING,
            Preset::Icon => WebPPreset::WEBP_PRESET_ICON,
            Preset::Text => WebPPreset::WEBP_PRESET_TEXT,
        }
    }
}

/// Quality the codec's own initializer assumes when none is given.
pub const DEFAULT_QUALITY: f32 = 75.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Knobs {
    method: Option<u32>,
    passes: Option<u32>,
    preprocessing: Option<bool>,
    target_psnr: Option<f32>,
    thread_level: Option<u32>,
    low_memory: Option<bool>,
    segments: Option<u32>,
    sns_strength: Option<u32>,
    filter_strength: Option<u32>,
    filter_sharpness: Option<u32>,
    filter_type: Option<FilterType>,
    alpha_compression: Option<bool>,
    auto_filter: Option<bool>,
    alpha_filtering: Option<AlphaFilter>,
    alpha_quality: Option<u32>,
    show_compressed: Option<bool>,
    partitions: Option<u32>,
    partition_limit: Option<u32>,
    sharp_yuv: Option<bool>,
    quality_range: Option<(u32, u32)>,
}

fn check_range(
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
    range: &'static str,
) -> Result<u32, CodecError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(CodecError::invalid_parameter(field, value, range))
    }
}

/// Persistent builder for [`EncoderConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfigBuilder {
    target: EncoderTarget,
    preset: Preset,
    content_hint: ContentHint,
    max_pixel_size: Option<Size>,
    knobs: Knobs,
}

impl EncoderConfigBuilder {
    /// Target a perceptual quality in `0.0..=100.0`.
    pub fn from_quality(quality: f32) -> Result<Self, CodecError> {
        Self::from_quality_with(quality, Preset::Default, ContentHint::Default)
    }

    /// Target a quality, starting from `preset` and advising `hint`.
    pub fn from_quality_with(
        quality: f32,
        preset: Preset,
        hint: ContentHint,
    ) -> Result<Self, CodecError> {
        if !quality.is_finite() || !(0.0..=100.0).contains(&quality) {
            return Err(CodecError::invalid_parameter(
                "quality",
                quality,
                "0.0..=100.0",
            ));
        }
        Ok(Self::seeded(EncoderTarget::Quality(quality), preset, hint))
    }

    /// Target an output size in bytes.
    pub fn from_file_size(bytes: u32) -> Result<Self, CodecError> {
        Self::from_file_size_with(bytes, Preset::Default, ContentHint::Default)
    }

    /// Target an output size, starting from `preset` and advising `hint`.
    ///
    /// The codec searches for the quality that meets the size, starting from
    /// [`DEFAULT_QUALITY`]. A [`target_psnr`](Self::with_target_psnr) override
    /// takes precedence over the size target.
    pub fn from_file_size_with(
        bytes: u32,
        preset: Preset,
        hint: ContentHint,
    ) -> Result<Self, CodecError> {
        if bytes == 0 || bytes > i32::MAX as u32 {
            return Err(CodecError::invalid_parameter(
                "file_size",
                bytes,
                "1..=2147483647",
            ));
        }
        Ok(Self::seeded(EncoderTarget::FileSize(bytes), preset, hint))
    }

    fn seeded(target: EncoderTarget, preset: Preset, content_hint: ContentHint) -> Self {
        Self {
            target,
            preset,
            content_hint,
            max_pixel_size: None,
            knobs: Knobs::default(),
        }
    }

    fn with_knobs(&self, f: impl FnOnce(&mut Knobs)) -> Self {
        let mut next = self.clone();
        f(&mut next.knobs);
        next
    }

    /// Replace the baseline preset.
    pub fn with_preset(&self, preset: Preset) -> Self {
        Self {
            preset,
            ..self.clone()
        }
    }

    /// Replace the content hint.
    pub fn with_content_hint(&self, content_hint: ContentHint) -> Self {
        Self {
            content_hint,
            ..self.clone()
        }
    }

    /// Downscale (never upscale) the source to fit this box before encoding.
    ///
    /// A box with a zero component clears the limit.
    pub fn with_max_pixel_size(&self, size: Size) -> Self {
        Self {
            max_pixel_size: (!size.is_empty()).then_some(size),
            ..self.clone()
        }
    }

    /// Speed/size trade-off, 0 (fastest) to 6 (smallest).
    pub fn with_method(&self, method: u32) -> Result<Self, CodecError> {
        let v = check_range("method", method, 0, 6, "0..=6")?;
        Ok(self.with_knobs(|k| k.method = Some(v)))
    }

    /// Number of entropy-analysis passes, 1 to 10.
    pub fn with_passes(&self, passes: u32) -> Result<Self, CodecError> {
        let v = check_range("passes", passes, 1, 10, "1..=10")?;
        Ok(self.with_knobs(|k| k.passes = Some(v)))
    }

    /// Segment-smoothing preprocessing.
    pub fn with_preprocessing(&self, enabled: bool) -> Self {
        self.with_knobs(|k| k.preprocessing = Some(enabled))
    }

    /// Minimal distortion to aim for, in dB. Zero disables it.
    pub fn with_target_psnr(&self, psnr: f32) -> Result<Self, CodecError> {
        if !psnr.is_finite() || psnr < 0.0 {
            return Err(CodecError::invalid_parameter(
                "target_psnr",
                psnr,
                "finite, >= 0.0",
            ));
        }
        Ok(self.with_knobs(|k| k.target_psnr = Some(psnr)))
    }

    /// Multi-threaded encoding level.
    ///
    /// libwebp only distinguishes "off" (0) and "on" (1), so any positive
    /// level is stored as 1.
    pub fn with_thread_level(&self, level: u32) -> Self {
        self.with_knobs(|k| k.thread_level = Some(level.min(1)))
    }

    /// Trade encoding speed for lower peak memory.
    pub fn with_low_memory(&self, enabled: bool) -> Self {
        self.with_knobs(|k| k.low_memory = Some(enabled))
    }

    /// Number of segments, 1 to 4.
    pub fn with_segments(&self, segments: u32) -> Result<Self, CodecError> {
        let v = check_range("segments", segments, 1, 4, "1..=4")?;
        Ok(self.with_knobs(|k| k.segments = Some(v)))
    }

    /// Spatial noise shaping strength, 0 to 100.
    pub fn with_sns_strength(&self, strength: u32) -> Result<Self, CodecError> {
        let v = check_range("sns_strength", strength, 0, 100, "0..=100")?;
        Ok(self.with_knobs(|k| k.sns_strength = Some(v)))
    }

    /// Deblocking filter strength, 0 (off) to 100.
    pub fn with_filter_strength(&self, strength: u32) -> Result<Self, CodecError> {
        let v = check_range("filter_strength", strength, 0, 100, "0..=100")?;
        Ok(self.with_knobs(|k| k.filter_strength = Some(v)))
    }

    /// Deblocking filter sharpness, 0 (sharpest) to 7.
    pub fn with_filter_sharpness(&self, sharpness: u32) -> Result<Self, CodecError> {
        let v = check_range("filter_sharpness", sharpness, 0, 7, "0..=7")?;
        Ok(self.with_knobs(|k| k.filter_sharpness = Some(v)))
    }

    pub fn with_filter_type(&self, filter_type: FilterType) -> Self {
        self.with_knobs(|k| k.filter_type = Some(filter_type))
    }

    /// Compress the alpha plane losslessly (`true`) or store it raw.
    pub fn with_alpha_compression(&self, enabled: bool) -> Self {
        self.with_knobs(|k| k.alpha_compression = Some(enabled))
    }

    /// Let the codec pick the deblocking strength.
    pub fn with_auto_filter(&self, enabled: bool) -> Self {
        self.with_knobs(|k| k.auto_filter = Some(enabled))
    }

    pub fn with_alpha_filtering(&self, filter: AlphaFilter) -> Self {
        self.with_knobs(|k| k.alpha_filtering = Some(filter))
    }

    /// Alpha plane quality, 0 to 100.
    pub fn with_alpha_quality(&self, quality: u32) -> Result<Self, CodecError> {
        let v = check_range("alpha_quality", quality, 0, 100, "0..=100")?;
        Ok(self.with_knobs(|k| k.alpha_quality = Some(v)))
    }

    /// Export the compressed picture back (debugging aid).
    pub fn with_show_compressed(&self, enabled: bool) -> Self {
        self.with_knobs(|k| k.show_compressed = Some(enabled))
    }

    /// log2 of the number of token partitions, 0 to 3.
    pub fn with_partitions(&self, partitions: u32) -> Result<Self, CodecError> {
        let v = check_range("partitions", partitions, 0, 3, "0..=3")?;
        Ok(self.with_knobs(|k| k.partitions = Some(v)))
    }

    /// Quality degradation allowed to fit the 512k first-partition limit, 0 to 100.
    pub fn with_partition_limit(&self, limit: u32) -> Result<Self, CodecError> {
        let v = check_range("partition_limit", limit, 0, 100, "0..=100")?;
        Ok(self.with_knobs(|k| k.partition_limit = Some(v)))
    }

    /// Sharper, slower RGB to YUV conversion.
    pub fn with_sharp_yuv(&self, enabled: bool) -> Self {
        self.with_knobs(|k| k.sharp_yuv = Some(enabled))
    }

    /// Bounds for the quality the codec may pick, each 0 to 100.
    ///
    /// Mostly useful with a file-size or PSNR target, where the codec
    /// searches for a quality.
    pub fn with_quality_range(&self, min: u32, max: u32) -> Result<Self, CodecError> {
        let min = check_range("quality_range", min, 0, 100, "0..=100")?;
        let max = check_range("quality_range", max, min, 100, "min..=100")?;
        Ok(self.with_knobs(|k| k.quality_range = Some((min, max))))
    }

    /// Freeze the builder into an immutable configuration.
    pub fn build(&self) -> EncoderConfig {
        EncoderConfig {
            target: self.target,
            preset: self.preset,
            content_hint: self.content_hint,
            max_pixel_size: self.max_pixel_size,
            knobs: self.knobs,
        }
    }
}

/// Immutable, validated encoder parameter set.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    target: EncoderTarget,
    preset: Preset,
    content_hint: ContentHint,
    max_pixel_size: Option<Size>,
    knobs: Knobs,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfigBuilder::seeded(
            EncoderTarget::Quality(DEFAULT_QUALITY),
            Preset::Default,
            ContentHint::Default,
        )
        .build()
    }
}

impl EncoderConfig {
    pub fn target(&self) -> EncoderTarget {
        self.target
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn content_hint(&self) -> ContentHint {
        self.content_hint
    }

    pub fn max_pixel_size(&self) -> Option<Size> {
        self.max_pixel_size
    }

    pub fn method(&self) -> Option<u32> {
        self.knobs.method
    }

    pub fn passes(&self) -> Option<u32> {
        self.knobs.passes
    }

    pub fn preprocessing(&self) -> Option<bool> {
        self.knobs.preprocessing
    }

    pub fn target_psnr(&self) -> Option<f32> {
        self.knobs.target_psnr
    }

    pub fn thread_level(&self) -> Option<u32> {
        self.knobs.thread_level
    }

    pub fn low_memory(&self) -> Option<bool> {
        self.knobs.low_memory
    }

    pub fn segments(&self) -> Option<u32> {
        self.knobs.segments
    }

    pub fn sns_strength(&self) -> Option<u32> {
        self.knobs.sns_strength
    }

    pub fn filter_strength(&self) -> Option<u32> {
        self.knobs.filter_strength
    }

    pub fn filter_sharpness(&self) -> Option<u32> {
        self.knobs.filter_sharpness
    }

    pub fn filter_type(&self) -> Option<FilterType> {
        self.knobs.filter_type
    }

    pub fn alpha_compression(&self) -> Option<bool> {
        self.knobs.alpha_compression
    }

    pub fn auto_filter(&self) -> Option<bool> {
        self.knobs.auto_filter
    }

    pub fn alpha_filtering(&self) -> Option<AlphaFilter> {
        self.knobs.alpha_filtering
    }

    pub fn alpha_quality(&self) -> Option<u32> {
        self.knobs.alpha_quality
    }

    pub fn show_compressed(&self) -> Option<bool> {
        self.knobs.show_compressed
    }

    pub fn partitions(&self) -> Option<u32> {
        self.knobs.partitions
    }

    pub fn partition_limit(&self) -> Option<u32> {
        self.knobs.partition_limit
    }

    pub fn sharp_yuv(&self) -> Option<bool> {
        self.knobs.sharp_yuv
    }

    /// `(min, max)` quality bounds.
    pub fn quality_range(&self) -> Option<(u32, u32)> {
        self.knobs.quality_range
    }

    /// Quality handed to the preset initializer.
    pub(crate) fn seed_quality(&self) -> f32 {
        match self.target {
            EncoderTarget::Quality(q) => q,
            EncoderTarget::FileSize(_) => DEFAULT_QUALITY,
        }
    }

    /// Write the target, hint, and every present knob into a preset-initialized
    /// native config. Absent knobs keep the preset's value.
    pub(crate) fn apply_to(&self, native: &mut WebPConfig) {
        match self.target {
            EncoderTarget::Quality(q) => native.quality = q,
            EncoderTarget::FileSize(bytes) => native.target_size = bytes as i32,
        }
        native.image_hint = self.content_hint.to_native();

        let k = &self.knobs;
        let flag = |b: bool| b as i32;
        if let Some(v) = k.method {
            native.method = v as i32;
        }
        if let Some(v) = k.passes {
            native.pass = v as i32;
        }
        if let Some(v) = k.preprocessing {
            native.preprocessing = flag(v);
        }
        if let Some(v) = k.target_psnr {
            native.target_PSNR = v;
        }
        if let Some(v) = k.thread_level {
            native.thread_level = v as i32;
        }
        if let Some(v) = k.low_memory {
            native.low_memory = flag(v);
        }
        if let Some(v) = k.segments {
            native.segments = v as i32;
        }
        if let Some(v) = k.sns_strength {
            native.sns_strength = v as i32;
        }
        if let Some(v) = k.filter_strength {
            native.filter_strength = v as i32;
        }
        if let Some(v) = k.filter_sharpness {
            native.filter_sharpness = v as i32;
        }
        if let Some(v) = k.filter_type {
            native.filter_type = match v {
                FilterType::Simple => 0,
                FilterType::Strong => 1,
            };
        }
        if let Some(v) = k.alpha_compression {
            native.alpha_compression = flag(v);
        }
        if let Some(v) = k.auto_filter {
            native.autofilter = flag(v);
        }
        if let Some(v) = k.alpha_filtering {
            native.alpha_filtering = match v {
                AlphaFilter::None => 0,
                AlphaFilter::Fast => 1,
                AlphaFilter::Best => 2,
            };
        }
        if let Some(v) = k.alpha_quality {
            native.alpha_quality = v as i32;
        }
        if let Some(v) = k.show_compressed {
            native.show_compressed = flag(v);
        }
        if let Some(v) = k.partitions {
            native.partitions = v as i32;
        }
        if let Some(v) = k.partition_limit {
            native.partition_limit = v as i32;
        }
        if let Some(v) = k.sharp_yuv {
            native.use_sharp_yuv = flag(v);
        }
        if let Some((min, max)) = k.quality_range {
            native.qmin = min as i32;
            native.qmax = max as i32;
        }
    }
}

#[cfg(test)]
impl EncoderConfig {
    /// Set a method without the builder's range check.
    pub(crate) fn with_unchecked_method(mut self, method: u32) -> Self {
        self.knobs.method = Some(method);
        self
    }
}

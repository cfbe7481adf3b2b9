//! Error type for conversion operations.

use crate::bitmap::PixelFormat;

/// Unified error type for decode, encode, and configuration operations.
///
/// Every variant is terminal for the operation that produced it; no partial
/// image or partial byte stream is ever returned alongside an error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Input does not carry a WebP container header.
    #[error("not a recognized WebP container")]
    NotRecognizedFormat,

    /// The codec rejected or failed to decode the stream.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// The codec rejected the configuration or failed to encode.
    #[error("encode failed: {0}")]
    EncodeFailed(String),

    /// An encoder knob or target was outside its documented range.
    #[error("invalid value {value} for {field} (expected {range})")]
    InvalidParameter {
        field: &'static str,
        value: String,
        range: &'static str,
    },

    /// The bitmap side cannot host (or provide) this pixel layout.
    #[error("unsupported pixel format {0:?}")]
    UnsupportedPixelFormat(PixelFormat),

    /// Structurally invalid caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Resource limit exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

impl CodecError {
    pub(crate) fn invalid_parameter(
        field: &'static str,
        value: impl core::fmt::Display,
        range: &'static str,
    ) -> Self {
        CodecError::InvalidParameter {
            field,
            value: value.to_string(),
            range,
        }
    }
}

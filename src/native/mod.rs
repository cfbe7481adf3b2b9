//! Safe wrappers over the libwebp C API.
//!
//! This is the only module allowed to use `unsafe`. Each native handle is
//! owned by a guard type whose `Drop` releases it, so every exit path,
//! including `?` early returns, frees what was acquired.

pub(crate) mod decode;
pub(crate) mod demux;
pub(crate) mod encode;
pub(crate) mod mux;

use libwebp_sys::{VP8StatusCode, WebPEncodingError, WebPMuxError};

pub(crate) fn status_message(status: VP8StatusCode) -> &'static str {
    match status {
        VP8StatusCode::VP8_STATUS_OK => "ok",
        VP8StatusCode::VP8_STATUS_OUT_OF_MEMORY => "out of memory",
        VP8StatusCode::VP8_STATUS_INVALID_PARAM => "invalid parameter",
        VP8StatusCode::VP8_STATUS_BITSTREAM_ERROR => "bitstream error",
        VP8StatusCode::VP8_STATUS_UNSUPPORTED_FEATURE => "unsupported feature",
        VP8StatusCode::VP8_STATUS_SUSPENDED => "suspended",
        VP8StatusCode::VP8_STATUS_USER_ABORT => "aborted",
        VP8StatusCode::VP8_STATUS_NOT_ENOUGH_DATA => "not enough data",
    }
}

pub(crate) fn encoding_error_message(error: WebPEncodingError) -> &'static str {
    match error {
        WebPEncodingError::VP8_ENC_OK => "ok",
        WebPEncodingError::VP8_ENC_ERROR_OUT_OF_MEMORY => "out of memory",
        WebPEncodingError::VP8_ENC_ERROR_BITSTREAM_OUT_OF_MEMORY => {
            "out of memory while flushing bitstream"
        }
        WebPEncodingError::VP8_ENC_ERROR_NULL_PARAMETER => "null parameter",
        WebPEncodingError::VP8_ENC_ERROR_INVALID_CONFIGURATION => "invalid configuration",
        WebPEncodingError::VP8_ENC_ERROR_BAD_DIMENSION => "bad picture dimension",
        WebPEncodingError::VP8_ENC_ERROR_PARTITION0_OVERFLOW => "partition 0 overflow",
        WebPEncodingError::VP8_ENC_ERROR_PARTITION_OVERFLOW => "token partition overflow",
        WebPEncodingError::VP8_ENC_ERROR_BAD_WRITE => "write failed",
        WebPEncodingError::VP8_ENC_ERROR_FILE_TOO_BIG => "file too big",
        WebPEncodingError::VP8_ENC_ERROR_USER_ABORT => "aborted",
        WebPEncodingError::VP8_ENC_ERROR_LAST => "unknown encoder error",
    }
}

pub(crate) fn mux_error_message(error: WebPMuxError) -> &'static str {
    match error {
        WebPMuxError::WEBP_MUX_OK => "ok",
        WebPMuxError::WEBP_MUX_NOT_FOUND => "chunk not found",
        WebPMuxError::WEBP_MUX_INVALID_ARGUMENT => "invalid argument",
        WebPMuxError::WEBP_MUX_BAD_DATA => "bad data",
        WebPMuxError::WEBP_MUX_MEMORY_ERROR => "out of memory",
        WebPMuxError::WEBP_MUX_NOT_ENOUGH_DATA => "not enough data",
    }
}

//! Error types for the core crate

use thiserror::Error;

/// Frame encoding/decoding errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Encoding failed: {0}")]
    Encode(serde_json::Error),

    #[error("Decoding failed: {0}")]
    Decode(serde_json::Error),

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

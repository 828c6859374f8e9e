//! Error types for draw_hal
//!
//! Recoverable capability failures (unsupported formats, image decoding,
//! buffer size mismatches) and backend failures are all reported through
//! [`Error`]. Reference-count corruption is NOT an error value: it is logged
//! by [`RefCounted::release`](crate::RefCounted::release) and refused.

use std::fmt;

use crate::draw::{DataFormat, ShaderLanguage, TextureType};

/// Result type for draw_hal operations
pub type Result<T> = std::result::Result<T, Error>;

/// draw_hal errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, GL, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (destroyed handle, wrong backend, etc.)
    InvalidResource(String),

    /// Context construction failed
    InitializationFailed(String),

    /// The backend cannot allocate this format/type combination
    UnsupportedFormat {
        texture_type: TextureType,
        format: DataFormat,
    },

    /// No known image signature in the data
    ImageDetectionFailed,

    /// The image container was recognized but could not be decoded
    ImageDecodeFailed(String),

    /// Full buffer write with a size different from the buffer capacity
    SizeMismatch {
        expected: usize,
        actual: usize,
    },

    /// Partial buffer write past the end of the buffer
    OutOfRange {
        offset: usize,
        size: usize,
        capacity: usize,
    },

    /// Operation not valid with the current binding state
    InvalidState(String),

    /// Pipeline shader set does not satisfy the minimum stage requirement
    InvalidPipeline(String),

    /// No shader source supplied for the dialect the backend compiles
    MissingShaderSource(ShaderLanguage),

    /// Shader compiler rejected the source
    ShaderCompilationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::UnsupportedFormat { texture_type, format } => {
                write!(f, "Unsupported texture format {:?} for type {:?}", format, texture_type)
            }
            Error::ImageDetectionFailed => write!(f, "Could not detect image file type"),
            Error::ImageDecodeFailed(msg) => write!(f, "Image decode failed: {}", msg),
            Error::SizeMismatch { expected, actual } => {
                write!(f, "Size mismatch: expected {} bytes, got {}", expected, actual)
            }
            Error::OutOfRange { offset, size, capacity } => write!(
                f,
                "Out of range: write of {} bytes at offset {} exceeds capacity {}",
                size, offset, capacity
            ),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::InvalidPipeline(msg) => write!(f, "Invalid pipeline: {}", msg),
            Error::MissingShaderSource(language) => {
                write!(f, "No shader source supplied for {:?}", language)
            }
            Error::ShaderCompilationFailed(msg) => write!(f, "Shader compilation failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

//! Error types for visual comparison.

use thiserror::Error;

/// Reasons a visual comparison could not produce signals.
///
/// Every variant fails closed at the comparator boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisionError {
    /// Image bytes could not be decoded.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// The canonical reference image could not be read.
    #[error("canonical image {path} unavailable: {reason}")]
    CanonicalImage { path: String, reason: String },

    /// Raster dimensions do not fit the operation.
    #[error("invalid dimensions: {0}")]
    Dimensions(String),

    /// An image primitive failed.
    #[error("image primitive failed: {0}")]
    Primitive(String),

    /// The comparison worker panicked or was cancelled.
    #[error("comparison worker failed: {0}")]
    Worker(String),
}

/// Result type for vision operations.
pub type Result<T> = std::result::Result<T, VisionError>;

//! The error type shared by every fallible operation in the crate.

use thiserror::Error;

/// The errors that can occur while segmenting an image.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SegmentError {
    /// The pixel buffer does not hold exactly `width * height` RGBA pixels,
    /// or it holds more than [`MAX_PIXELS`](crate::MAX_PIXELS) pixels.
    #[error("unusable pixel buffer: expected {expected} bytes, but got {actual}")]
    BufferSize {
        /// The number of bytes implied by the dimensions.
        expected: usize,
        /// The number of bytes actually provided.
        actual: usize,
    },

    /// The image has a width or height of zero.
    #[error("cannot segment an image with zero width or height")]
    EmptyImage,

    /// A value given to a checked conversion was outside of its supported range.
    #[error("{value} is outside of the supported range {min}..={max}")]
    OutOfRange {
        /// The rejected value.
        value: u32,
        /// The smallest accepted value.
        min: u32,
        /// The largest accepted value.
        max: u32,
    },

    /// The segmentation was cancelled before it produced a result.
    #[error("segmentation aborted")]
    Aborted,

    /// The segmentation failed while running.
    #[error("segmentation failed: {0}")]
    Failed(String),

    /// Resampling an image failed.
    #[cfg(feature = "image")]
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl SegmentError {
    /// Whether this error represents a cancellation rather than a failure.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// A specialized `Result` type for segmentation operations.
pub type Result<T> = std::result::Result<T, SegmentError>;

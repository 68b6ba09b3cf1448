//! Error types for stereo-subpixel.
//!
//! Only structural problems are errors: bad buffers, mismatched shapes and
//! invalid configuration. Per-pixel estimation failures never surface here;
//! they mark the pixel invalid (see [`crate::refine::Rejection`]).

use thiserror::Error;

/// Result alias for stereo-subpixel operations.
pub type SubpixelResult<T> = std::result::Result<T, SubpixelError>;

/// Errors raised before any per-pixel work starts.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubpixelError {
    /// Width or height is zero, or their product overflows.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// Row stride is smaller than the row width.
    #[error("stride {stride} is smaller than width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// The backing buffer cannot hold the described image.
    #[error("buffer too small: need {needed} elements, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Two inputs that must share dimensions do not.
    #[error("{what} is {got_width}x{got_height}, expected {width}x{height}")]
    ShapeMismatch {
        what: &'static str,
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
    /// A configuration value is out of its accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Image decoding failed (only with the `image-io` feature).
    #[error("image io: {reason}")]
    ImageIo { reason: String },
}

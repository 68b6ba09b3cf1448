//! Per-pixel sub-pixel estimators.
//!
//! Each estimator is a pure function of a [`PixelContext`], the pixel
//! coordinates and its integer seed. It returns the fractional [`Offset`] to
//! add to the seed, or the [`Rejection`] that makes the pixel invalid.

use crate::image::sample::{Sampler, WindowSize};

pub mod affine;
pub mod parabola;

/// Fractional correction to an integer seed disparity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Offset {
    pub dx: f32,
    pub dy: f32,
}

/// Reason a pixel could not be refined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Cost curve is flat or not convex around the seed.
    FlatCost,
    /// Weighted normal equations are singular or lack support.
    Singular,
    /// Parameter update exploded.
    Diverged,
    /// Refined offset is outside the plausible range.
    OutOfRange,
    /// A NaN or infinity appeared.
    NonFinite,
    /// Too few window pixels were classified as inliers.
    LowSupport,
    /// Left-to-right and right-to-left estimates disagree.
    Inconsistent,
}

impl Rejection {
    /// Short stable name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::FlatCost => "flat_cost",
            Rejection::Singular => "singular",
            Rejection::Diverged => "diverged",
            Rejection::OutOfRange => "out_of_range",
            Rejection::NonFinite => "non_finite",
            Rejection::LowSupport => "low_support",
            Rejection::Inconsistent => "inconsistent",
        }
    }
}

/// Outcome of refining a single pixel.
pub type PixelOutcome = Result<Offset, Rejection>;

/// Which disparity components are refined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Axes {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Axes {
    /// Returns true if at least one axis is refined.
    pub fn any(&self) -> bool {
        self.horizontal || self.vertical
    }
}

/// Read-only inputs shared by every pixel of one refinement direction.
#[derive(Clone, Copy, Debug)]
pub struct PixelContext<'a> {
    /// Image the windows are centered in.
    pub reference: Sampler<'a>,
    /// Image searched at the seed displacement.
    pub search: Sampler<'a>,
    pub window: WindowSize,
    pub axes: Axes,
}

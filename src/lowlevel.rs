//! Low-level building blocks for custom refinement pipelines.
//!
//! These expose the sampler, window costs and per-pixel estimators behind
//! [`SubpixelView`](crate::SubpixelView). Most users should prefer
//! [`refine_disparity`](crate::refine_disparity) or `SubpixelView`.

pub use crate::cost::{gaussian_density, ssd, Mixture, VARIANCE_EPSILON};
pub use crate::image::gradient::{GradientSampler, Gradients};
pub use crate::image::sample::{Sampler, Window, WindowSize};
pub use crate::refine::affine::refine_pixel as refine_pixel_affine;
pub use crate::refine::parabola::{
    parabola_vertex_offset, refine_pixel as refine_pixel_parabola, MAX_OFFSET,
};
pub use crate::refine::{Axes, Offset, PixelContext, PixelOutcome};

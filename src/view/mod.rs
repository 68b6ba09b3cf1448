//! Field-level refinement of seed disparities.
//!
//! A [`SubpixelView`] owns the pre-filtered stereo pair and both gradient
//! images. [`SubpixelView::refine`] maps a seed [`DisparityField`] to a refined
//! one pixel by pixel: invalid seeds are copied through, valid seeds are
//! rounded to the integer grid and handed to the configured [`Estimator`].
//! A rejected pixel keeps its seed vector and is flagged invalid.
//!
//! Rows are independent, so the `rayon` feature can split the output by rows
//! (see [`SubpixelConfig::parallel`]) without changing any result.

#[cfg(feature = "rayon")]
mod rayon;

use crate::disparity::{Disparity, DisparityField};
use crate::image::gradient::Gradients;
use crate::image::sample::{EdgeExtension, Interpolation, Sampler, WindowSize};
use crate::image::{ImageF32, ImageView, Pixel};
use crate::prefilter::{PreFilter, PreFilterConfig};
use crate::refine::affine::{self, EmOptions};
use crate::refine::{parabola, Axes, PixelContext, PixelOutcome, Rejection};
use crate::trace::{trace_debug, trace_event, trace_span};
use crate::util::math::round_seed;
use crate::util::{SubpixelError, SubpixelResult};

/// Sub-pixel estimator selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Estimator {
    /// Closed-form parabola through the SSD at the seed and its neighbours.
    #[default]
    Parabola,
    /// Gaussian-windowed affine Lucas-Kanade, every sample an inlier.
    Affine,
    /// Affine Lucas-Kanade with an EM inlier/outlier mixture.
    AffineEm,
}

impl Estimator {
    /// Short stable name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Estimator::Parabola => "parabola",
            Estimator::Affine => "affine",
            Estimator::AffineEm => "affine_em",
        }
    }
}

/// Configuration for sub-pixel refinement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubpixelConfig {
    /// Correlation window width (positive, odd).
    pub kernel_width: usize,
    /// Correlation window height (positive, odd).
    pub kernel_height: usize,
    /// Refine the column component.
    pub do_horizontal: bool,
    /// Refine the row component.
    pub do_vertical: bool,
    /// Cross-check every valid pixel by refining right to left.
    pub refine_both_images: bool,
    /// Largest accepted norm of `forward + reverse` in the symmetric check.
    pub symmetric_tolerance: f32,
    pub estimator: Estimator,
    pub prefilter: PreFilterConfig,
    pub interpolation: Interpolation,
    pub edge_extension: EdgeExtension,
    /// Options of the affine estimators.
    pub em: EmOptions,
    /// Refine rows in parallel (requires the `rayon` feature).
    pub parallel: bool,
    /// Emit a debug event for every rejected pixel.
    pub verbose: bool,
}

impl Default for SubpixelConfig {
    fn default() -> Self {
        Self {
            kernel_width: 7,
            kernel_height: 7,
            do_horizontal: true,
            do_vertical: true,
            refine_both_images: false,
            symmetric_tolerance: 0.5,
            estimator: Estimator::Parabola,
            prefilter: PreFilterConfig::default(),
            interpolation: Interpolation::Bicubic,
            edge_extension: EdgeExtension::Zero,
            em: EmOptions::default(),
            parallel: false,
            verbose: false,
        }
    }
}

impl SubpixelConfig {
    /// Checks every option before any image work starts.
    pub fn validate(&self) -> SubpixelResult<()> {
        if self.kernel_width == 0 || self.kernel_width % 2 == 0 {
            return Err(SubpixelError::InvalidConfig(
                "kernel_width must be positive and odd",
            ));
        }
        if self.kernel_height == 0 || self.kernel_height % 2 == 0 {
            return Err(SubpixelError::InvalidConfig(
                "kernel_height must be positive and odd",
            ));
        }
        let area = self
            .kernel_width
            .checked_mul(self.kernel_height)
            .and_then(|area| area.checked_mul(std::mem::size_of::<f32>()));
        if !matches!(area, Some(bytes) if bytes <= isize::MAX as usize) {
            return Err(SubpixelError::InvalidConfig(
                "kernel_width * kernel_height is too large",
            ));
        }
        if !(self.symmetric_tolerance.is_finite() && self.symmetric_tolerance > 0.0) {
            return Err(SubpixelError::InvalidConfig(
                "symmetric_tolerance must be positive",
            ));
        }
        self.prefilter.validate()?;
        self.em.validate()
    }

    /// Correlation window size.
    pub fn window(&self) -> WindowSize {
        WindowSize::new(self.kernel_width, self.kernel_height)
    }

    /// Refined axes.
    pub fn axes(&self) -> Axes {
        Axes {
            horizontal: self.do_horizontal,
            vertical: self.do_vertical,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    /// Left is the reference image.
    Forward,
    /// Right is the reference image.
    Reverse,
}

/// Pre-filtered stereo pair ready for per-pixel refinement.
#[derive(Clone, Debug)]
pub struct SubpixelView {
    cfg: SubpixelConfig,
    left: ImageF32,
    right: ImageF32,
    left_grad: Gradients,
    right_grad: Gradients,
}

impl SubpixelView {
    /// Validates `cfg` and pre-filters both images with `cfg.prefilter`.
    pub fn new<T: Pixel>(
        left: ImageView<'_, T>,
        right: ImageView<'_, T>,
        cfg: SubpixelConfig,
    ) -> SubpixelResult<Self> {
        cfg.validate()?;
        let filter = cfg.prefilter.build(cfg.edge_extension);
        Self::build(left, right, cfg, filter.as_ref())
    }

    /// Like [`SubpixelView::new`] with a caller-supplied pre-filter.
    ///
    /// `cfg.prefilter` is ignored.
    pub fn with_prefilter<T: Pixel>(
        left: ImageView<'_, T>,
        right: ImageView<'_, T>,
        cfg: SubpixelConfig,
        filter: &dyn PreFilter,
    ) -> SubpixelResult<Self> {
        cfg.validate()?;
        Self::build(left, right, cfg, filter)
    }

    /// Expects a validated `cfg`.
    fn build<T: Pixel>(
        left: ImageView<'_, T>,
        right: ImageView<'_, T>,
        cfg: SubpixelConfig,
        filter: &dyn PreFilter,
    ) -> SubpixelResult<Self> {
        check_dims("right image", left.dims(), right.dims())?;

        let (width, height) = left.dims();
        let _span = trace_span!("prefilter", width = width, height = height).entered();
        let left = filter.apply(&ImageF32::from_view(left));
        let right = filter.apply(&ImageF32::from_view(right));
        check_dims("filtered right image", (width, height), (right.width(), right.height()))?;
        check_dims("filtered left image", (width, height), (left.width(), left.height()))?;
        let left_grad = Gradients::central(&left, cfg.edge_extension);
        let right_grad = Gradients::central(&right, cfg.edge_extension);

        Ok(Self {
            cfg,
            left,
            right,
            left_grad,
            right_grad,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SubpixelConfig {
        &self.cfg
    }

    /// Returns `(width, height)` of the stereo pair.
    pub fn dims(&self) -> (usize, usize) {
        (self.left.width(), self.left.height())
    }

    /// Pre-filtered left image.
    pub fn filtered_left(&self) -> &ImageF32 {
        &self.left
    }

    /// Pre-filtered right image.
    pub fn filtered_right(&self) -> &ImageF32 {
        &self.right
    }

    /// Refines every entry of `seed`.
    ///
    /// `seed` must have the dimensions of the stereo pair. The output has the
    /// same dimensions; invalid seeds are copied unchanged.
    pub fn refine(&self, seed: &DisparityField) -> SubpixelResult<DisparityField> {
        check_dims("seed field", self.dims(), seed.dims())?;
        Ok(self.refine_field(seed))
    }

    /// Expects `seed` to match [`SubpixelView::dims`].
    fn refine_field(&self, seed: &DisparityField) -> DisparityField {
        let _span = trace_span!(
            "refine_disparity",
            width = seed.width(),
            height = seed.height(),
            estimator = self.cfg.estimator.as_str(),
            parallel = self.cfg.parallel
        )
        .entered();

        let mut out = seed.clone();
        if self.cfg.axes().any() {
            self.refine_rows(seed, &mut out);
        }

        trace_event!(
            "refine_summary",
            valid = out.valid_count(),
            invalid = out.invalid_count(),
            invalid_seeds = seed.invalid_count()
        );
        out
    }

    /// Refines one pixel from its integer seed.
    ///
    /// Returns the absolute refined disparity, or the reason the pixel is
    /// rejected. Honors the symmetric check when `refine_both_images` is set.
    pub fn refine_pixel(&self, x: usize, y: usize, seed: (i32, i32)) -> Result<Disparity, Rejection> {
        let forward = self.estimate(Direction::Forward, x, y, seed)?;
        let dx = seed.0 as f32 + forward.dx;
        let dy = seed.1 as f32 + forward.dy;
        if self.cfg.refine_both_images {
            self.check_symmetric(x, y, dx, dy)?;
        }
        Ok(Disparity::valid(dx, dy))
    }

    fn refine_rows(&self, seed: &DisparityField, out: &mut DisparityField) {
        #[cfg(feature = "rayon")]
        {
            if self.cfg.parallel {
                self::rayon::refine_rows_par(self, seed, out);
                return;
            }
        }

        let width = seed.width();
        for (y, (seeds, row)) in seed
            .rows()
            .zip(out.as_mut_slice().chunks_mut(width))
            .enumerate()
        {
            self.refine_row(y, seeds, row);
        }
    }

    pub(crate) fn refine_row(&self, y: usize, seeds: &[Disparity], out: &mut [Disparity]) {
        for (x, (seed, slot)) in seeds.iter().zip(out.iter_mut()).enumerate() {
            *slot = self.refine_entry(x, y, *seed);
        }
    }

    fn refine_entry(&self, x: usize, y: usize, seed: Disparity) -> Disparity {
        if !seed.valid {
            return seed;
        }
        let rounded = round_seed(seed.dx).zip(round_seed(seed.dy));
        let outcome = match rounded {
            Some(s) => self.refine_pixel(x, y, s),
            None => Err(Rejection::NonFinite),
        };
        match outcome {
            Ok(refined) => refined,
            Err(reason) => {
                if self.cfg.verbose {
                    trace_debug!("pixel_rejected", x = x, y = y, reason = reason.as_str());
                }
                Disparity::invalid(seed.dx, seed.dy)
            }
        }
    }

    fn estimate(&self, direction: Direction, x: usize, y: usize, seed: (i32, i32)) -> PixelOutcome {
        let (reference, search, grad) = match direction {
            Direction::Forward => (&self.left, &self.right, &self.right_grad),
            Direction::Reverse => (&self.right, &self.left, &self.left_grad),
        };
        let interp = self.cfg.interpolation;
        let edge = self.cfg.edge_extension;
        let ctx = PixelContext {
            reference: Sampler::new(reference.view(), interp, edge),
            search: Sampler::new(search.view(), interp, edge),
            window: self.cfg.window(),
            axes: self.cfg.axes(),
        };
        match self.cfg.estimator {
            Estimator::Parabola => parabola::refine_pixel(&ctx, x, y, seed),
            Estimator::Affine => {
                affine::refine_pixel(&ctx, &grad.sampler(interp, edge), &self.cfg.em, false, x, y, seed)
            }
            Estimator::AffineEm => {
                affine::refine_pixel(&ctx, &grad.sampler(interp, edge), &self.cfg.em, true, x, y, seed)
            }
        }
    }

    /// Refines right to left at the matched pixel and compares.
    fn check_symmetric(&self, x: usize, y: usize, dx: f32, dy: f32) -> Result<(), Rejection> {
        let (width, height) = self.dims();
        let qx = (x as f32 + dx).round();
        let qy = (y as f32 + dy).round();
        if !(qx >= 0.0 && qy >= 0.0 && qx < width as f32 && qy < height as f32) {
            return Err(Rejection::Inconsistent);
        }
        let (qx, qy) = (qx as usize, qy as usize);
        let back_seed = (x as i32 - qx as i32, y as i32 - qy as i32);
        let back = self
            .estimate(Direction::Reverse, qx, qy, back_seed)
            .map_err(|_| Rejection::Inconsistent)?;
        let ex = back_seed.0 as f32 + back.dx;
        let ey = back_seed.1 as f32 + back.dy;
        if (dx + ex).hypot(dy + ey) > self.cfg.symmetric_tolerance {
            return Err(Rejection::Inconsistent);
        }
        Ok(())
    }
}

/// Refines `seed` against the stereo pair in one call.
///
/// Shapes and configuration are checked before any filtering.
pub fn refine_disparity<T: Pixel>(
    seed: &DisparityField,
    left: ImageView<'_, T>,
    right: ImageView<'_, T>,
    cfg: &SubpixelConfig,
) -> SubpixelResult<DisparityField> {
    cfg.validate()?;
    check_dims("seed field", left.dims(), seed.dims())?;
    let filter = cfg.prefilter.build(cfg.edge_extension);
    Ok(SubpixelView::build(left, right, *cfg, filter.as_ref())?.refine_field(seed))
}

fn check_dims(
    what: &'static str,
    expected: (usize, usize),
    got: (usize, usize),
) -> SubpixelResult<()> {
    if expected == got {
        return Ok(());
    }
    Err(SubpixelError::ShapeMismatch {
        what,
        width: expected.0,
        height: expected.1,
        got_width: got.0,
        got_height: got.1,
    })
}

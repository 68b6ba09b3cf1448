//! Affine Lucas-Kanade refinement with an EM inlier/outlier mixture.
//!
//! The reference window around `(x, y)` is compared against the search image
//! sampled through a local affine warp
//!
//! ```text
//! u = x + i + sx + tx + axx * i + axy * j
//! v = y + j + sy + ty + ayx * i + ayy * j
//! ```
//!
//! where `(i, j)` are window offsets and `(sx, sy)` the integer seed. Each
//! iteration runs an E-step (per-sample inlier responsibility under a
//! Gaussian + uniform mixture) and an M-step (mixture variance and weight,
//! then a responsibility-weighted Gauss-Newton update of the warp). The
//! returned offset is the translation `(tx, ty)`.
//!
//! The inlier variance starts from the median absolute residual of the first
//! warp, so a few saturated samples cannot inflate it.
//!
//! With `robust = false` every responsibility is one, which reduces the loop to
//! plain Gaussian-windowed affine Lucas-Kanade.

use nalgebra::{Matrix6, Vector6};

use crate::cost::Mixture;
use crate::image::gradient::GradientSampler;
use crate::image::sample::{Window, WindowSize};
use crate::refine::{parabola, Axes, Offset, PixelContext, PixelOutcome, Rejection};
use crate::util::{SubpixelError, SubpixelResult};

const TX: usize = 0;
const AXX: usize = 1;
const AXY: usize = 2;
const TY: usize = 3;
const AYX: usize = 4;
const AYY: usize = 5;

/// Largest accepted magnitude of a linear warp coefficient.
const MAX_LINEAR_COEFF: f64 = 0.75;
/// Absolute variance floor.
const MIN_VARIANCE: f64 = 1e-12;
/// Effective weight fraction below which the system has no support.
const MIN_SUPPORT: f64 = 1e-3;
/// Bounds for the re-estimated inlier weight.
const MIN_MIXING: f64 = 1e-3;
/// Relative pivot size below which the normal matrix is treated as singular.
const PIVOT_EPS: f64 = 1e-12;
/// Median absolute deviation to standard deviation for Gaussian noise.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Warp family fitted by the affine estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AffineModel {
    /// Translation only (two parameters).
    Translation,
    /// Translation plus 2x2 linear part (six parameters).
    #[default]
    Affine,
}

/// Handling of the outlier component's prior weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutlierPrior {
    /// Keep the outlier weight constant.
    Fixed { outlier_weight: f32 },
    /// Start from `initial_outlier_weight` and re-estimate it every M-step.
    Estimated { initial_outlier_weight: f32 },
}

impl Default for OutlierPrior {
    fn default() -> Self {
        OutlierPrior::Estimated {
            initial_outlier_weight: 0.1,
        }
    }
}

impl OutlierPrior {
    fn outlier_weight(&self) -> f32 {
        match *self {
            OutlierPrior::Fixed { outlier_weight } => outlier_weight,
            OutlierPrior::Estimated {
                initial_outlier_weight,
            } => initial_outlier_weight,
        }
    }
}

/// Tuning of the affine / Bayes-EM estimator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmOptions {
    pub model: AffineModel,
    /// Upper bound on EM rounds.
    pub max_iterations: usize,
    /// Stop when the pixel-scaled update norm falls below this value.
    pub convergence_threshold: f32,
    /// Minimum final inlier fraction for a valid pixel.
    pub min_inlier_fraction: f32,
    pub outlier_prior: OutlierPrior,
    /// Inlier variance floor relative to the reference window variance.
    pub variance_floor_ratio: f32,
    /// Start the translation from the parabola estimate when it is valid.
    pub seed_from_parabola: bool,
}

impl Default for EmOptions {
    fn default() -> Self {
        Self {
            model: AffineModel::Affine,
            max_iterations: 25,
            convergence_threshold: 1e-3,
            min_inlier_fraction: 0.4,
            outlier_prior: OutlierPrior::default(),
            variance_floor_ratio: 1e-4,
            seed_from_parabola: true,
        }
    }
}

impl EmOptions {
    /// Checks option ranges.
    pub fn validate(&self) -> SubpixelResult<()> {
        if self.max_iterations == 0 {
            return Err(SubpixelError::InvalidConfig(
                "em max_iterations must be at least 1",
            ));
        }
        if !(self.convergence_threshold.is_finite() && self.convergence_threshold > 0.0) {
            return Err(SubpixelError::InvalidConfig(
                "em convergence_threshold must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_inlier_fraction) {
            return Err(SubpixelError::InvalidConfig(
                "em min_inlier_fraction must be within [0, 1]",
            ));
        }
        let w = self.outlier_prior.outlier_weight();
        if !(w > 0.0 && w < 1.0) {
            return Err(SubpixelError::InvalidConfig(
                "em outlier weight must be within (0, 1)",
            ));
        }
        if !(self.variance_floor_ratio.is_finite() && self.variance_floor_ratio >= 0.0) {
            return Err(SubpixelError::InvalidConfig(
                "em variance_floor_ratio must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Refines one pixel with the affine estimator.
///
/// `gradient` must sample the derivatives of `ctx.search`. With `robust`
/// set, residuals are weighted by their EM inlier responsibility and the
/// pixel is rejected when the final inlier fraction is below
/// `opts.min_inlier_fraction`.
///
/// A six-parameter fit rejected as singular, diverged, out of range or
/// non-finite is repeated once with the translation-only model before the
/// pixel is given up.
pub fn refine_pixel(
    ctx: &PixelContext<'_>,
    gradient: &GradientSampler<'_>,
    opts: &EmOptions,
    robust: bool,
    x: usize,
    y: usize,
    seed: (i32, i32),
) -> PixelOutcome {
    let fit = WarpFit::new(ctx, opts, x, y, seed);
    match fit.solve(ctx, gradient, opts, robust, opts.model) {
        Err(
            Rejection::Singular
            | Rejection::Diverged
            | Rejection::OutOfRange
            | Rejection::NonFinite,
        ) if opts.model == AffineModel::Affine => {
            fit.solve(ctx, gradient, opts, robust, AffineModel::Translation)
        }
        outcome => outcome,
    }
}

/// Per-pixel state shared by every model tried on the same window.
struct WarpFit {
    reference: Window,
    grid: WindowGrid,
    variance_floor: f64,
    outlier_density: f64,
    origin: (f64, f64),
    max_offset: f64,
    start: Offset,
}

impl WarpFit {
    fn new(ctx: &PixelContext<'_>, opts: &EmOptions, x: usize, y: usize, seed: (i32, i32)) -> Self {
        let size = ctx.window;
        let reference = ctx.reference.window(x, y, 0.0, 0.0, size);
        let grid = WindowGrid::new(size);
        let (ref_variance, ref_range) = window_stats(&reference, &grid.weights, grid.total);

        let start = if opts.seed_from_parabola {
            parabola::refine_pixel(ctx, x, y, seed).unwrap_or_default()
        } else {
            Offset::default()
        };

        Self {
            variance_floor: (f64::from(opts.variance_floor_ratio) * ref_variance).max(MIN_VARIANCE),
            outlier_density: 1.0 / (2.0 * ref_range).max(MIN_VARIANCE),
            origin: (x as f64 + f64::from(seed.0), y as f64 + f64::from(seed.1)),
            max_offset: size.half_width().max(size.half_height()).max(1) as f64,
            reference,
            grid,
            start,
        }
    }

    fn solve(
        &self,
        ctx: &PixelContext<'_>,
        gradient: &GradientSampler<'_>,
        opts: &EmOptions,
        robust: bool,
        model: AffineModel,
    ) -> PixelOutcome {
        let grid = &self.grid;
        let free = free_parameters(ctx.axes, model);
        let estimate_weight = matches!(opts.outlier_prior, OutlierPrior::Estimated { .. });

        let mut params = Vector6::<f64>::zeros();
        params[TX] = f64::from(self.start.dx);
        params[TY] = f64::from(self.start.dy);

        let mut samples = WarpSamples::with_capacity(grid.offsets.len());
        let mut resp = vec![1.0f64; grid.offsets.len()];
        let mut mixture: Option<Mixture> = None;

        for _ in 0..opts.max_iterations {
            samples.fill(ctx, gradient, &self.reference, grid, self.origin, &params)?;

            // E-step
            if robust {
                let mix = mixture.unwrap_or_else(|| Mixture {
                    inlier_weight: 1.0 - f64::from(opts.outlier_prior.outlier_weight()),
                    variance: robust_variance(&samples.residual).max(self.variance_floor),
                    outlier_density: self.outlier_density,
                });
                for (w, &r) in resp.iter_mut().zip(&samples.residual) {
                    *w = mix.responsibility(r);
                }

                // M-step: mixture
                let support: f64 = resp.iter().zip(&grid.weights).map(|(w, g)| w * g).sum();
                if !(support > MIN_SUPPORT * grid.total) {
                    return Err(Rejection::Singular);
                }
                let weighted_sq: f64 = resp
                    .iter()
                    .zip(&grid.weights)
                    .zip(&samples.residual)
                    .map(|((w, g), r)| w * g * r * r)
                    .sum();
                let mut next = mix;
                next.variance = (weighted_sq / support).max(self.variance_floor);
                if estimate_weight {
                    next.inlier_weight =
                        (support / grid.total).clamp(MIN_MIXING, 1.0 - MIN_MIXING);
                }
                mixture = Some(next);
            }

            // M-step: warp
            let step = gauss_newton_step(&samples, grid, &resp, &free)?;
            let norm = scaled_norm(&step, grid);
            if norm > 2.0 * self.max_offset {
                return Err(Rejection::Diverged);
            }
            params += step;

            if params[TX].abs() > self.max_offset || params[TY].abs() > self.max_offset {
                return Err(Rejection::OutOfRange);
            }
            if [AXX, AXY, AYX, AYY]
                .iter()
                .any(|&p| params[p].abs() > MAX_LINEAR_COEFF)
            {
                return Err(Rejection::Diverged);
            }
            if norm < f64::from(opts.convergence_threshold) {
                break;
            }
        }

        if let Some(mix) = mixture {
            samples.fill(ctx, gradient, &self.reference, grid, self.origin, &params)?;
            let inliers: f64 = samples
                .residual
                .iter()
                .zip(&grid.weights)
                .map(|(&r, g)| g * mix.responsibility(r))
                .sum();
            if inliers / grid.total < f64::from(opts.min_inlier_fraction) {
                return Err(Rejection::LowSupport);
            }
        }

        let offset = Offset {
            dx: params[TX] as f32,
            dy: params[TY] as f32,
        };
        if offset.dx.is_finite() && offset.dy.is_finite() {
            Ok(offset)
        } else {
            Err(Rejection::NonFinite)
        }
    }
}

/// Window offsets with their Gaussian spatial weights, in window row-major order.
struct WindowGrid {
    offsets: Vec<(f64, f64)>,
    weights: Vec<f64>,
    total: f64,
    reach_x: f64,
    reach_y: f64,
}

impl WindowGrid {
    fn new(size: WindowSize) -> Self {
        let hw = size.half_width() as i64;
        let hh = size.half_height() as i64;
        let sigma_x = size.width as f64 / 2.0;
        let sigma_y = size.height as f64 / 2.0;
        let mut offsets = Vec::with_capacity(size.len());
        let mut weights = Vec::with_capacity(size.len());
        for j in -hh..=hh {
            for i in -hw..=hw {
                let (fi, fj) = (i as f64, j as f64);
                offsets.push((fi, fj));
                weights.push(
                    (-(fi * fi) / (2.0 * sigma_x * sigma_x) - (fj * fj) / (2.0 * sigma_y * sigma_y))
                        .exp(),
                );
            }
        }
        let total = weights.iter().sum();
        Self {
            offsets,
            weights,
            total,
            reach_x: (hw as f64).max(1.0),
            reach_y: (hh as f64).max(1.0),
        }
    }
}

/// Residuals and search gradients at the warped sample positions.
struct WarpSamples {
    residual: Vec<f64>,
    gx: Vec<f64>,
    gy: Vec<f64>,
}

impl WarpSamples {
    fn with_capacity(n: usize) -> Self {
        Self {
            residual: Vec::with_capacity(n),
            gx: Vec::with_capacity(n),
            gy: Vec::with_capacity(n),
        }
    }

    fn fill(
        &mut self,
        ctx: &PixelContext<'_>,
        gradient: &GradientSampler<'_>,
        reference: &Window,
        grid: &WindowGrid,
        origin: (f64, f64),
        params: &Vector6<f64>,
    ) -> Result<(), Rejection> {
        self.residual.clear();
        self.gx.clear();
        self.gy.clear();
        for (&(i, j), &r) in grid.offsets.iter().zip(reference.samples()) {
            let u = origin.0 + i + params[TX] + params[AXX] * i + params[AXY] * j;
            let v = origin.1 + j + params[TY] + params[AYX] * i + params[AYY] * j;
            let (u, v) = (u as f32, v as f32);
            let value = ctx.search.at(u, v);
            let (gx, gy) = gradient.at(u, v);
            let residual = f64::from(value) - f64::from(r);
            if !residual.is_finite() || !gx.is_finite() || !gy.is_finite() {
                return Err(Rejection::NonFinite);
            }
            self.residual.push(residual);
            self.gx.push(f64::from(gx));
            self.gy.push(f64::from(gy));
        }
        Ok(())
    }
}

fn free_parameters(axes: Axes, model: AffineModel) -> [bool; 6] {
    let linear = model == AffineModel::Affine;
    let h = axes.horizontal;
    let v = axes.vertical;
    [h, h && linear, h && linear, v, v && linear, v && linear]
}

/// Solves the responsibility-weighted normal equations for the warp update.
fn gauss_newton_step(
    samples: &WarpSamples,
    grid: &WindowGrid,
    resp: &[f64],
    free: &[bool; 6],
) -> Result<Vector6<f64>, Rejection> {
    let mut h = Matrix6::<f64>::zeros();
    let mut b = Vector6::<f64>::zeros();
    for k in 0..grid.offsets.len() {
        let w = grid.weights[k] * resp[k];
        if w <= 0.0 {
            continue;
        }
        let (i, j) = grid.offsets[k];
        let (gx, gy) = (samples.gx[k], samples.gy[k]);
        let jac = Vector6::new(gx, gx * i, gx * j, gy, gy * i, gy * j);
        h += jac * jac.transpose() * w;
        b -= jac * (w * samples.residual[k]);
    }

    for (p, &is_free) in free.iter().enumerate() {
        if !is_free {
            h.row_mut(p).fill(0.0);
            h.column_mut(p).fill(0.0);
            h[(p, p)] = 1.0;
            b[p] = 0.0;
        }
    }

    let pivot_max = (0..6)
        .filter(|&p| free[p])
        .map(|p| h[(p, p)])
        .fold(0.0f64, f64::max);
    if !(pivot_max > 0.0) || (0..6).any(|p| free[p] && !(h[(p, p)] > PIVOT_EPS * pivot_max)) {
        return Err(Rejection::Singular);
    }

    let step = h.cholesky().ok_or(Rejection::Singular)?.solve(&b);
    if step.iter().all(|v| v.is_finite()) {
        Ok(step)
    } else {
        Err(Rejection::NonFinite)
    }
}

/// Update norm in pixels: linear terms are scaled by the window reach.
fn scaled_norm(step: &Vector6<f64>, grid: &WindowGrid) -> f64 {
    let (rx, ry) = (grid.reach_x, grid.reach_y);
    (step[TX].powi(2)
        + step[TY].powi(2)
        + (rx * step[AXX]).powi(2)
        + (ry * step[AXY]).powi(2)
        + (rx * step[AYX]).powi(2)
        + (ry * step[AYY]).powi(2))
    .sqrt()
}

/// Gaussian variance matching the median absolute residual.
fn robust_variance(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    let mut abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    let mid = abs.len() / 2;
    let (_, median, _) = abs.select_nth_unstable_by(mid, f64::total_cmp);
    let sigma = MAD_TO_SIGMA * *median;
    sigma * sigma
}

/// Weighted variance and (unweighted) range of the reference window.
fn window_stats(window: &Window, weights: &[f64], total: f64) -> (f64, f64) {
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for (&v, &w) in window.samples().iter().zip(weights) {
        let v = f64::from(v);
        sum += w * v;
        sum_sq += w * v * v;
        lo = lo.min(v);
        hi = hi.max(v);
    }
    let mean = sum / total;
    let variance = (sum_sq / total - mean * mean).max(0.0);
    let range = if hi >= lo { hi - lo } else { 0.0 };
    (variance, range)
}

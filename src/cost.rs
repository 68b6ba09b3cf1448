//! Window costs and residual likelihoods.
//!
//! The parabola estimator ranks candidate displacements by SSD; the Bayes-EM
//! estimator weighs individual residuals by their posterior probability of
//! being Gaussian inlier noise rather than uniform outliers.

use crate::image::sample::Window;

/// Smallest variance used in a Gaussian density.
pub const VARIANCE_EPSILON: f64 = 1e-12;

/// Sum of squared differences between two windows of equal size.
///
/// Lower is better. Accumulates in `f64`.
pub fn ssd(reference: &Window, candidate: &Window) -> f64 {
    debug_assert_eq!(reference.size(), candidate.size());
    reference
        .samples()
        .iter()
        .zip(candidate.samples())
        .map(|(&r, &c)| {
            let d = f64::from(c) - f64::from(r);
            d * d
        })
        .sum()
}

/// Zero-mean Gaussian density of `residual` with the given variance.
///
/// The variance is floored at [`VARIANCE_EPSILON`].
#[inline]
pub fn gaussian_density(residual: f64, variance: f64) -> f64 {
    let variance = variance.max(VARIANCE_EPSILON);
    (-0.5 * residual * residual / variance).exp() / (2.0 * std::f64::consts::PI * variance).sqrt()
}

/// Two-component residual model: Gaussian inliers and uniform outliers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mixture {
    /// Prior probability that a residual is an inlier.
    pub inlier_weight: f64,
    /// Inlier noise variance.
    pub variance: f64,
    /// Outlier density (uniform over the residual range).
    pub outlier_density: f64,
}

impl Mixture {
    /// Posterior probability that `residual` is an inlier.
    pub fn responsibility(&self, residual: f64) -> f64 {
        let inlier = self.inlier_weight * gaussian_density(residual, self.variance);
        let outlier = (1.0 - self.inlier_weight) * self.outlier_density;
        let total = inlier + outlier;
        if total > 0.0 && total.is_finite() {
            inlier / total
        } else if inlier.is_finite() && inlier > 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

//! Pre-filters applied once to each stereo image before refinement.
//!
//! A pre-filter suppresses low-frequency intensity bias between the two views
//! so that window costs compare texture rather than brightness. The refiner
//! only depends on the [`PreFilter`] trait; [`NullFilter`], [`GaussianBlur`]
//! and [`LogFilter`] are the stock transforms selectable through
//! [`PreFilterConfig`].
//!
//! Convolutions are separable and resolve border taps with an
//! [`EdgeExtension`] policy (zero by default, matching the sampler).

use crate::image::sample::{EdgeExtension, Interpolation, Sampler};
use crate::image::ImageF32;
use crate::util::math::{gaussian_kernel, gaussian_radius, gaussian_second_derivative_kernel};
use crate::util::{SubpixelError, SubpixelResult};

/// Image-to-image transform applied to both views before window extraction.
pub trait PreFilter: Send + Sync {
    /// Filters `image`, returning a new image of the same dimensions.
    fn apply(&self, image: &ImageF32) -> ImageF32;
}

/// Identity transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullFilter;

impl PreFilter for NullFilter {
    fn apply(&self, image: &ImageF32) -> ImageF32 {
        image.clone()
    }
}

/// Separable Gaussian smoothing.
#[derive(Clone, Copy, Debug)]
pub struct GaussianBlur {
    pub sigma: f32,
    pub edge: EdgeExtension,
}

impl GaussianBlur {
    pub fn new(sigma: f32) -> Self {
        Self {
            sigma,
            edge: EdgeExtension::Zero,
        }
    }
}

impl PreFilter for GaussianBlur {
    fn apply(&self, image: &ImageF32) -> ImageF32 {
        let kernel = gaussian_kernel(self.sigma, gaussian_radius(self.sigma));
        let tmp = convolve(image, &kernel, Axis::Rows, self.edge);
        convolve(&tmp, &kernel, Axis::Cols, self.edge)
    }
}

/// Laplacian-of-Gaussian band-pass filter.
///
/// Computed as `Gxx * I + Gyy * I` with separable second-derivative and
/// smoothing kernels. The second-derivative kernel has zero sum, so constant
/// regions map to zero.
#[derive(Clone, Copy, Debug)]
pub struct LogFilter {
    pub sigma: f32,
    pub edge: EdgeExtension,
}

impl LogFilter {
    pub fn new(sigma: f32) -> Self {
        Self {
            sigma,
            edge: EdgeExtension::Zero,
        }
    }
}

impl PreFilter for LogFilter {
    fn apply(&self, image: &ImageF32) -> ImageF32 {
        let radius = gaussian_radius(self.sigma);
        let smooth = gaussian_kernel(self.sigma, radius);
        let second = gaussian_second_derivative_kernel(self.sigma, radius);

        let smooth_y = convolve(image, &smooth, Axis::Cols, self.edge);
        let lxx = convolve(&smooth_y, &second, Axis::Rows, self.edge);
        let smooth_x = convolve(image, &smooth, Axis::Rows, self.edge);
        let lyy = convolve(&smooth_x, &second, Axis::Cols, self.edge);

        let mut out = lxx;
        for y in 0..out.height() {
            let add = lyy.row_slice(y);
            for (v, &a) in out.row_mut(y).iter_mut().zip(add) {
                *v += a;
            }
        }
        out
    }
}

/// Stock pre-filter selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PreFilterKind {
    /// No filtering.
    None,
    /// Gaussian blur with `sigma = scale`.
    Blur,
    /// Laplacian of Gaussian with `sigma = scale`.
    #[default]
    Log,
}

/// Pre-filter selection and its smoothing scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreFilterConfig {
    pub kind: PreFilterKind,
    /// Gaussian standard deviation in pixels; ignored by `None`.
    pub scale: f32,
}

impl Default for PreFilterConfig {
    fn default() -> Self {
        Self {
            kind: PreFilterKind::Log,
            scale: 1.4,
        }
    }
}

impl PreFilterConfig {
    /// Checks that the scale is usable for the selected kind.
    pub fn validate(&self) -> SubpixelResult<()> {
        if self.kind != PreFilterKind::None && !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(SubpixelError::InvalidConfig(
                "prefilter scale must be positive and finite",
            ));
        }
        Ok(())
    }

    /// Builds the configured filter with the given border policy.
    pub fn build(&self, edge: EdgeExtension) -> Box<dyn PreFilter> {
        match self.kind {
            PreFilterKind::None => Box::new(NullFilter),
            PreFilterKind::Blur => Box::new(GaussianBlur {
                sigma: self.scale,
                edge,
            }),
            PreFilterKind::Log => Box::new(LogFilter {
                sigma: self.scale,
                edge,
            }),
        }
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Rows,
    Cols,
}

/// 1D convolution along `axis` with a symmetric, odd-length kernel.
fn convolve(image: &ImageF32, kernel: &[f32], axis: Axis, edge: EdgeExtension) -> ImageF32 {
    let reader = Sampler::new(image.view(), Interpolation::Nearest, edge);
    let radius = (kernel.len() / 2) as i64;
    let mut out = image.clone();
    for y in 0..image.height() {
        let yi = y as i64;
        for (x, v) in out.row_mut(y).iter_mut().enumerate() {
            let xi = x as i64;
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let t = k as i64 - radius;
                acc += w * match axis {
                    Axis::Rows => reader.pixel(xi + t, yi),
                    Axis::Cols => reader.pixel(xi, yi + t),
                };
            }
            *v = acc;
        }
    }
    out
}

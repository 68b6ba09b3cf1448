//! Central-difference image gradients for the affine estimator.
//!
//! Derivatives use the 3-tap kernel `[-0.5, 0, 0.5]` along each axis. Border
//! taps are resolved through the same [`EdgeExtension`] the sampler uses, so
//! gradients stay consistent with the values the estimator interpolates.

use crate::image::sample::{EdgeExtension, Interpolation, Sampler};
use crate::image::ImageF32;

/// Horizontal and vertical derivative images of one pre-filtered image.
#[derive(Clone, Debug)]
pub struct Gradients {
    /// d/dx (along columns).
    pub gx: ImageF32,
    /// d/dy (along rows).
    pub gy: ImageF32,
}

impl Gradients {
    /// Computes central differences of `image`.
    pub fn central(image: &ImageF32, edge: EdgeExtension) -> Self {
        let height = image.height();
        let reader = Sampler::new(image.view(), Interpolation::Nearest, edge);
        let mut gx = image.clone();
        let mut gy = image.clone();

        for y in 0..height {
            let yi = y as i64;
            let row_x = gx.row_mut(y);
            for (x, out) in row_x.iter_mut().enumerate() {
                let xi = x as i64;
                *out = 0.5 * (reader.pixel(xi + 1, yi) - reader.pixel(xi - 1, yi));
            }
            let row_y = gy.row_mut(y);
            for (x, out) in row_y.iter_mut().enumerate() {
                let xi = x as i64;
                *out = 0.5 * (reader.pixel(xi, yi + 1) - reader.pixel(xi, yi - 1));
            }
        }

        Self { gx, gy }
    }

    /// Samplers over both derivative images with the given policies.
    pub fn sampler(&self, interpolation: Interpolation, edge: EdgeExtension) -> GradientSampler<'_> {
        GradientSampler {
            gx: Sampler::new(self.gx.view(), interpolation, edge),
            gy: Sampler::new(self.gy.view(), interpolation, edge),
        }
    }
}

/// Interpolating reader over a gradient pair.
#[derive(Clone, Copy, Debug)]
pub struct GradientSampler<'a> {
    gx: Sampler<'a>,
    gy: Sampler<'a>,
}

impl GradientSampler<'_> {
    /// Returns `(d/dx, d/dy)` at a real-valued position.
    #[inline]
    pub fn at(&self, x: f32, y: f32) -> (f32, f32) {
        (self.gx.at(x, y), self.gy.at(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::Gradients;
    use crate::image::sample::EdgeExtension;
    use crate::image::ImageF32;

    #[test]
    fn central_differences_of_plane() {
        let width = 6;
        let height = 5;
        let data: Vec<f32> = (0..height)
            .flat_map(|y| (0..width).map(move |x| 3.0 * x as f32 - 2.0 * y as f32))
            .collect();
        let image = ImageF32::new(data, width, height).unwrap();
        let grad = Gradients::central(&image, EdgeExtension::Clamp);
        assert_eq!(grad.gx.get(2, 2), Some(3.0));
        assert_eq!(grad.gy.get(2, 2), Some(-2.0));
        // Clamped border uses a one-sided half difference.
        assert_eq!(grad.gx.get(0, 2), Some(1.5));
    }
}

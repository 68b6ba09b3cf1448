#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stereo_subpixel::lowlevel::Sampler;
use stereo_subpixel::{Disparity, DisparityField, EdgeExtension, ImageView, Interpolation};

pub const SIZE: usize = 100;

/// Synthetic stereo pair related by a horizontal stretch about the center.
///
/// `left` is uniform noise magnified three times with bicubic interpolation.
/// `right(x, y) = left((x - t) / s, y)` with `t = 50 - 50 s`, so the true
/// disparity of column `x` is `s x + t - x` and there is no vertical disparity.
pub struct StretchPair {
    pub stretch: f32,
    pub translation: f32,
    pub left: Vec<u8>,
    pub right: Vec<u8>,
}

impl StretchPair {
    pub fn new(stretch: f32) -> Self {
        let mut rng = StdRng::seed_from_u64(10);
        let noise: Vec<f32> = (0..SIZE * SIZE)
            .map(|_| f32::from(rng.random::<u8>()))
            .collect();
        let left = resample(&noise, |x, y| (x / 3.0, y / 3.0));

        let translation = 50.0 - 50.0 * stretch;
        let left_f: Vec<f32> = left.iter().map(|&v| f32::from(v)).collect();
        let right = resample(&left_f, |x, y| ((x - translation) / stretch, y));

        Self {
            stretch,
            translation,
            left,
            right,
        }
    }

    pub fn left_view(&self) -> ImageView<'_, u8> {
        ImageView::from_slice(&self.left, SIZE, SIZE).unwrap()
    }

    pub fn right_view(&self) -> ImageView<'_, u8> {
        ImageView::from_slice(&self.right, SIZE, SIZE).unwrap()
    }

    /// Both views rescaled to `[0, 1]`.
    pub fn unit_float(&self) -> (Vec<f32>, Vec<f32>) {
        let scale = |data: &[u8]| data.iter().map(|&v| f32::from(v) / 255.0).collect();
        (scale(&self.left), scale(&self.right))
    }

    pub fn expected(&self, x: usize) -> f32 {
        self.stretch * x as f32 + self.translation - x as f32
    }

    /// Integer seed per column: the true disparity truncated toward zero.
    pub fn seed(&self) -> DisparityField {
        self.seed_offset_by(0)
    }

    /// Like [`StretchPair::seed`] with every seed moved by `delta` columns.
    pub fn seed_offset_by(&self, delta: i32) -> DisparityField {
        let mut field = DisparityField::new(SIZE, SIZE).unwrap();
        for y in 0..SIZE {
            for x in 0..SIZE {
                let dx = (self.expected(x) as i32 + delta) as f32;
                field.set(x, y, Disparity::valid(dx, 0.0));
            }
        }
        field
    }
}

/// Error statistics over every pixel of the field, valid or not.
#[derive(Debug)]
pub struct Score {
    /// Mean of `dy + |dx - expected|`.
    pub mean_error: f64,
    /// Mean of `|dy|`.
    pub mean_abs_dy: f64,
    pub invalid: usize,
}

/// Scores a refined field against the known stretch.
///
/// Invalid pixels count with the vector they carry (their seed), so
/// rejecting a pixel never improves the error.
pub fn score(field: &DisparityField, pair: &StretchPair) -> Score {
    let mut error = 0.0f64;
    let mut abs_dy = 0.0f64;
    for y in 0..SIZE {
        for x in 0..SIZE {
            let d = field.get(x, y).unwrap();
            error += f64::from(d.dy) + f64::from((d.dx - pair.expected(x)).abs());
            abs_dy += f64::from(d.dy.abs());
        }
    }
    let n = (SIZE * SIZE) as f64;
    Score {
        mean_error: error / n,
        mean_abs_dy: abs_dy / n,
        invalid: field.invalid_count(),
    }
}

/// Samples `src` (a `SIZE x SIZE` image) at `map(x, y)` for every output pixel.
fn resample(src: &[f32], map: impl Fn(f32, f32) -> (f32, f32)) -> Vec<u8> {
    let view = ImageView::from_slice(src, SIZE, SIZE).unwrap();
    let sampler = Sampler::new(view, Interpolation::Bicubic, EdgeExtension::Zero);
    let mut out = Vec::with_capacity(SIZE * SIZE);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let (sx, sy) = map(x as f32, y as f32);
            out.push(sampler.at(sx, sy).round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

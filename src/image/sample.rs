//! Windowed sampling with interpolation and edge extension.
//!
//! A [`Sampler`] wraps a pre-filtered `f32` view together with the
//! interpolation and edge-extension policy. Every read goes through
//! [`Sampler::pixel`], which resolves out-of-range coordinates through the
//! policy, so window extraction never fails and never reads out of bounds.
//! Non-finite sample coordinates are treated as lying outside the image.

use crate::image::ImageView;

/// Interpolation used for fractional sample positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Nearest pixel (rounding half away from zero).
    Nearest,
    /// 2x2 bilinear interpolation.
    Bilinear,
    /// 4x4 Catmull-Rom bicubic interpolation.
    #[default]
    Bicubic,
}

/// Value policy for reads outside the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EdgeExtension {
    /// Outside samples read as zero.
    #[default]
    Zero,
    /// Outside samples read the nearest border pixel.
    Clamp,
}

/// Window dimensions in pixels. Both sides are odd so a center pixel exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowSize {
    pub width: usize,
    pub height: usize,
}

impl WindowSize {
    /// Creates a window size; dimensions are validated by the caller's config.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Columns on each side of the center.
    pub fn half_width(&self) -> usize {
        self.width / 2
    }

    /// Rows on each side of the center.
    pub fn half_height(&self) -> usize {
        self.height / 2
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Returns true when the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Row-major window of samples, indexed from the top-left corner.
#[derive(Clone, Debug, PartialEq)]
pub struct Window {
    size: WindowSize,
    data: Vec<f32>,
}

impl Window {
    /// Returns the window dimensions.
    pub fn size(&self) -> WindowSize {
        self.size
    }

    /// Returns the samples in row-major order.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Returns the sample at window coordinates `(col, row)`.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.size.width {
            return None;
        }
        self.data.get(row * self.size.width + col).copied()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true when the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Interpolating reader over a single-channel `f32` image.
#[derive(Clone, Copy, Debug)]
pub struct Sampler<'a> {
    image: ImageView<'a, f32>,
    interpolation: Interpolation,
    edge: EdgeExtension,
}

impl<'a> Sampler<'a> {
    /// Creates a sampler over `image` with the given policies.
    pub fn new(image: ImageView<'a, f32>, interpolation: Interpolation, edge: EdgeExtension) -> Self {
        Self {
            image,
            interpolation,
            edge,
        }
    }

    /// Returns the underlying image view.
    pub fn image(&self) -> ImageView<'a, f32> {
        self.image
    }

    /// Reads an integer pixel, applying the edge-extension policy.
    #[inline]
    pub fn pixel(&self, x: i64, y: i64) -> f32 {
        let width = self.image.width() as i64;
        let height = self.image.height() as i64;
        let (x, y) = match self.edge {
            EdgeExtension::Zero => {
                if x < 0 || y < 0 || x >= width || y >= height {
                    return 0.0;
                }
                (x, y)
            }
            EdgeExtension::Clamp => (x.clamp(0, width - 1), y.clamp(0, height - 1)),
        };
        self.image
            .get(x as usize, y as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Samples the image at a real-valued position.
    pub fn at(&self, x: f32, y: f32) -> f32 {
        if !x.is_finite() || !y.is_finite() {
            return self.pixel(i64::MIN, i64::MIN);
        }
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let ix = x0 as i64;
        let iy = y0 as i64;
        if fx == 0.0 && fy == 0.0 {
            return self.pixel(ix, iy);
        }
        match self.interpolation {
            Interpolation::Nearest => self.pixel(x.round() as i64, y.round() as i64),
            Interpolation::Bilinear => {
                let a = self.pixel(ix, iy);
                let b = self.pixel(ix.saturating_add(1), iy);
                let c = self.pixel(ix, iy.saturating_add(1));
                let d = self.pixel(ix.saturating_add(1), iy.saturating_add(1));
                let top = a + (b - a) * fx;
                let bottom = c + (d - c) * fx;
                top + (bottom - top) * fy
            }
            Interpolation::Bicubic => {
                let wx = catmull_rom_weights(fx);
                let wy = catmull_rom_weights(fy);
                let mut acc = 0.0f32;
                for (j, &wj) in wy.iter().enumerate() {
                    if wj == 0.0 {
                        continue;
                    }
                    let yy = iy.saturating_add(j as i64 - 1);
                    let mut row_acc = 0.0f32;
                    for (i, &wi) in wx.iter().enumerate() {
                        if wi == 0.0 {
                            continue;
                        }
                        row_acc += wi * self.pixel(ix.saturating_add(i as i64 - 1), yy);
                    }
                    acc += wj * row_acc;
                }
                acc
            }
        }
    }

    /// Extracts a window centered on pixel `(cx, cy)` displaced by `(dx, dy)`.
    ///
    /// Integer displacements read pixels directly; fractional ones interpolate.
    pub fn window(&self, cx: usize, cy: usize, dx: f32, dy: f32, size: WindowSize) -> Window {
        let mut data = Vec::with_capacity(size.len());
        let hw = size.half_width() as i64;
        let hh = size.half_height() as i64;
        let integral = dx.fract() == 0.0 && dy.fract() == 0.0 && dx.is_finite() && dy.is_finite();
        if integral {
            let x0 = (cx as i64).saturating_add(dx as i64);
            let y0 = (cy as i64).saturating_add(dy as i64);
            for j in -hh..=hh {
                for i in -hw..=hw {
                    data.push(self.pixel(x0.saturating_add(i), y0.saturating_add(j)));
                }
            }
        } else {
            let x0 = cx as f32 + dx;
            let y0 = cy as f32 + dy;
            for j in -hh..=hh {
                for i in -hw..=hw {
                    data.push(self.at(x0 + i as f32, y0 + j as f32));
                }
            }
        }
        Window { size, data }
    }
}

/// Catmull-Rom cubic weights for taps at offsets -1, 0, 1, 2.
#[inline]
fn catmull_rom_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

//! Image views, owned buffers, and sampling.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride.
//! The stride counts elements between the starts of consecutive rows, so a
//! stride larger than the width represents padded rows. `OwnedImage` is the
//! contiguous owned counterpart; `ImageF32` is the working format of every
//! pre-filtered image the estimators read.

use crate::util::{SubpixelError, SubpixelResult};

pub mod gradient;
#[cfg(feature = "image-io")]
pub mod io;
pub mod sample;

/// Scalar sample types accepted as stereo input.
pub trait Pixel: Copy + Send + Sync + 'static {
    /// Converts the sample to `f32` without rescaling.
    fn to_f32(self) -> f32;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Pixel for u16 {
    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> SubpixelResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> SubpixelResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(SubpixelError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns `(width, height)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.stride + x)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        self.data.get(start..start + self.width)
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> SubpixelResult<usize> {
    if width == 0 || height == 0 {
        return Err(SubpixelError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(SubpixelError::InvalidStride { width, stride });
    }
    (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(SubpixelError::InvalidDimensions { width, height })
}

/// Owned contiguous single-channel image.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnedImage<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

/// Floating-point working image.
pub type ImageF32 = OwnedImage<f32>;

impl<T: Copy> OwnedImage<T> {
    /// Wraps a row-major buffer of exactly `width * height` samples.
    pub fn new(data: Vec<T>, width: usize, height: usize) -> SubpixelResult<Self> {
        if width == 0 || height == 0 {
            return Err(SubpixelError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(SubpixelError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(SubpixelError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(SubpixelError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the row-major sample buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Returns the sample at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        self.view().get(x, y).copied()
    }
}

impl OwnedImage<f32> {
    /// Zero-filled image. `width` and `height` must be non-zero.
    pub fn zeros(width: usize, height: usize) -> SubpixelResult<Self> {
        let len = width
            .checked_mul(height)
            .ok_or(SubpixelError::InvalidDimensions { width, height })?;
        Self::new(vec![0.0; len], width, height)
    }

    /// Converts any supported view into a contiguous `f32` image.
    pub fn from_view<T: Pixel>(view: ImageView<'_, T>) -> Self {
        let mut data = Vec::with_capacity(view.width() * view.height());
        for y in 0..view.height() {
            if let Some(row) = view.row(y) {
                data.extend(row.iter().map(|&v| v.to_f32()));
            }
        }
        Self {
            data,
            width: view.width(),
            height: view.height(),
        }
    }

    /// Mutable access to row `y`.
    pub(crate) fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Row `y` as a slice; `y` must be in bounds.
    pub(crate) fn row_slice(&self, y: usize) -> &[f32] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageF32, ImageView, OwnedImage};

    #[test]
    fn strided_view_skips_padding() {
        let data = [1u8, 2, 9, 3, 4, 9];
        let view = ImageView::new(&data, 2, 2, 3).unwrap();
        assert_eq!(view.row(1).unwrap(), &[3, 4]);
        assert_eq!(view.get(2, 0), None);

        let owned = ImageF32::from_view(view);
        assert_eq!(owned.data(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn owned_image_rejects_oversized_buffer() {
        assert!(OwnedImage::new(vec![0u8; 5], 2, 2).is_err());
        assert!(OwnedImage::new(vec![0u8; 4], 2, 2).is_ok());
    }
}

//! Dense per-pixel disparity vectors with validity flags.

use crate::util::{SubpixelError, SubpixelResult};

/// Disparity of one reference pixel.
///
/// `dx` is the column offset and `dy` the row offset from the reference pixel
/// to its correspondence in the other image. Invalid entries keep whatever
/// finite value they were given; consumers must check [`Disparity::is_valid`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Disparity {
    pub dx: f32,
    pub dy: f32,
    pub valid: bool,
}

impl Disparity {
    /// Valid disparity `(dx, dy)`.
    pub fn valid(dx: f32, dy: f32) -> Self {
        Self { dx, dy, valid: true }
    }

    /// Invalid disparity carrying `(dx, dy)` for display only.
    pub fn invalid(dx: f32, dy: f32) -> Self {
        Self {
            dx,
            dy,
            valid: false,
        }
    }

    /// Returns true if the entry may be used.
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Row-major grid of [`Disparity`] values, one per reference pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct DisparityField {
    width: usize,
    height: usize,
    data: Vec<Disparity>,
}

impl DisparityField {
    /// Field of `width * height` invalid zero entries.
    pub fn new(width: usize, height: usize) -> SubpixelResult<Self> {
        Self::filled(width, height, Disparity::default())
    }

    /// Field with every entry set to `value`.
    pub fn filled(width: usize, height: usize, value: Disparity) -> SubpixelResult<Self> {
        let len = checked_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![value; len],
        })
    }

    /// Wraps a row-major buffer of exactly `width * height` entries.
    pub fn from_vec(data: Vec<Disparity>, width: usize, height: usize) -> SubpixelResult<Self> {
        let needed = checked_len(width, height)?;
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
            width,
            height,
            data,
        })
    }

    /// Returns the field width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the field height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns `(width, height)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Returns the entry at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<Disparity> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    /// Mutable access to the entry at `(x, y)`.
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Disparity> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get_mut(y * self.width + x)
    }

    /// Overwrites the entry at `(x, y)`; returns false when out of bounds.
    pub fn set(&mut self, x: usize, y: usize, value: Disparity) -> bool {
        match self.get_mut(x, y) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Row `y` as a slice.
    pub fn row(&self, y: usize) -> Option<&[Disparity]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.width;
        self.data.get(start..start + self.width)
    }

    /// Iterates rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Disparity]> + '_ {
        self.data.chunks(self.width)
    }

    /// Iterates entries in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Disparity> + '_ {
        self.data.iter()
    }

    /// Entries in row-major order.
    pub fn as_slice(&self) -> &[Disparity] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Disparity] {
        &mut self.data
    }

    /// Number of valid entries.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|d| d.valid).count()
    }

    /// Number of invalid entries.
    pub fn invalid_count(&self) -> usize {
        self.data.len() - self.valid_count()
    }
}

fn checked_len(width: usize, height: usize) -> SubpixelResult<usize> {
    if width == 0 || height == 0 {
        return Err(SubpixelError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .ok_or(SubpixelError::InvalidDimensions { width, height })
}

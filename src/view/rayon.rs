//! Row-parallel refinement (feature-gated).
//!
//! Each worker owns a disjoint output row and reads the shared view, so the
//! result is identical to the sequential path.

use super::SubpixelView;
use crate::disparity::DisparityField;
use rayon::prelude::*;

pub(super) fn refine_rows_par(view: &SubpixelView, seed: &DisparityField, out: &mut DisparityField) {
    let width = seed.width();
    out.as_mut_slice()
        .par_chunks_mut(width)
        .zip(seed.as_slice().par_chunks(width))
        .enumerate()
        .for_each(|(y, (row, seeds))| view.refine_row(y, seeds, row));
}

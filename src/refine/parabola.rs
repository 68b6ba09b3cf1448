//! Closed-form parabola refinement of SSD minima.
//!
//! For each refined axis the SSD is evaluated at the seed and one pixel to
//! either side, and the vertex of the parabola through the three samples gives
//! the fractional offset. When those samples are not convex but one neighbour
//! is strictly lower than the seed, the fit is repeated once around that
//! neighbour. The horizontal axis is fitted first; the vertical samples are
//! then taken at the horizontally refined position.

use crate::cost::ssd;
use crate::refine::{Offset, PixelContext, PixelOutcome, Rejection};

/// Largest offset magnitude returned; keeps results inside the open interval (-1, 1).
pub const MAX_OFFSET: f32 = 0.999;

/// Minimum curvature relative to the sampled cost magnitude.
const CURVATURE_EPS: f32 = 1e-6;

/// Estimates the sub-sample minimum offset of a convex quadratic.
///
/// Given costs at `x = -1, 0, +1` (`cm`, `c0`, `cp`), returns the vertex
/// offset `0.5 * (cm - cp) / (cm - 2 * c0 + cp)` clamped to
/// `[-MAX_OFFSET, MAX_OFFSET]`. Returns `None` when any input is non-finite or
/// the curvature is not clearly positive (flat or inverted cost).
pub fn parabola_vertex_offset(cm: f32, c0: f32, cp: f32) -> Option<f32> {
    if !cm.is_finite() || !c0.is_finite() || !cp.is_finite() {
        return None;
    }

    let denom = cm - 2.0 * c0 + cp;
    let scale = cm.abs() + c0.abs() + cp.abs();
    if scale <= f32::MIN_POSITIVE || !(denom > CURVATURE_EPS * scale) {
        return None;
    }

    let dx = 0.5 * (cm - cp) / denom;
    if dx.is_finite() {
        Some(dx.clamp(-MAX_OFFSET, MAX_OFFSET))
    } else {
        None
    }
}

/// Refines one pixel with separable parabola fits on the SSD.
///
/// `seed` is the integer disparity `(dx, dy)` of pixel `(x, y)`.
pub fn refine_pixel(ctx: &PixelContext<'_>, x: usize, y: usize, seed: (i32, i32)) -> PixelOutcome {
    let size = ctx.window;
    let reference = ctx.reference.window(x, y, 0.0, 0.0, size);
    let sx = seed.0 as f32;
    let sy = seed.1 as f32;

    let mut offset = Offset::default();
    if ctx.axes.horizontal {
        offset.dx =
            fit_axis(|k| ssd(&reference, &ctx.search.window(x, y, sx + k, sy, size)) as f32)
                .ok_or(Rejection::FlatCost)?;
    }
    if ctx.axes.vertical {
        let dx = offset.dx;
        offset.dy =
            fit_axis(|k| ssd(&reference, &ctx.search.window(x, y, sx + dx, sy + k, size)) as f32)
                .ok_or(Rejection::FlatCost)?;
    }

    Ok(offset)
}

/// Fits the minimum of `cost`, sampled at integer steps from the seed.
///
/// Falls back to the samples around the lower neighbour when the three
/// samples around the seed are not convex. The result is clamped to
/// `[-MAX_OFFSET, MAX_OFFSET]`.
fn fit_axis(mut cost: impl FnMut(f32) -> f32) -> Option<f32> {
    let (cm, c0, cp) = (cost(-1.0), cost(0.0), cost(1.0));
    if let Some(offset) = parabola_vertex_offset(cm, c0, cp) {
        return Some(offset);
    }

    let (step, low) = if cm < cp { (-1.0, cm) } else { (1.0, cp) };
    if !(low < c0) {
        return None;
    }
    let far = cost(2.0 * step);
    let offset = if step < 0.0 {
        parabola_vertex_offset(far, low, c0)?
    } else {
        parabola_vertex_offset(c0, low, far)?
    };
    Some((step + offset).clamp(-MAX_OFFSET, MAX_OFFSET))
}

#[cfg(test)]
mod tests {
    use super::{fit_axis, parabola_vertex_offset, refine_pixel, MAX_OFFSET};
    use crate::image::sample::{EdgeExtension, Interpolation, Sampler, WindowSize};
    use crate::image::ImageView;
    use crate::refine::{Axes, PixelContext, Rejection};

    #[test]
    fn vertex_of_symmetric_costs_is_zero() {
        let dx = parabola_vertex_offset(0.9, 0.1, 0.9).unwrap();
        assert!(dx.abs() < 1e-6);
    }

    #[test]
    fn vertex_of_shifted_quadratic() {
        let f = |x: f32| 2.0 + (x - 0.3).powi(2);
        let dx = parabola_vertex_offset(f(-1.0), f(0.0), f(1.0)).unwrap();
        assert!((dx - 0.3).abs() < 1e-5);
    }

    #[test]
    fn non_convex_and_flat_costs_are_rejected() {
        assert!(parabola_vertex_offset(0.5, 1.0, 0.5).is_none());
        assert!(parabola_vertex_offset(3.0, 3.0, 3.0).is_none());
        assert!(parabola_vertex_offset(0.0, 0.0, 0.0).is_none());
        assert!(parabola_vertex_offset(f32::NAN, 0.0, 1.0).is_none());
    }

    #[test]
    fn steep_one_sided_costs_are_clamped() {
        let dx = parabola_vertex_offset(100.0, 10.0, 0.0).unwrap();
        assert!(dx <= MAX_OFFSET && dx > 0.9);
    }

    #[test]
    fn saturated_costs_are_refit_around_the_lower_neighbour() {
        // SSD of a narrow feature whose minimum sits 0.9 px from the seed:
        // the samples at -1, 0, +1 are not convex.
        let cost = |k: f32| 1.0 - (-(k - 0.9).powi(2)).exp();
        assert!(parabola_vertex_offset(cost(-1.0), cost(0.0), cost(1.0)).is_none());

        let dx = fit_axis(cost).unwrap();
        assert!(dx > 0.85 && dx <= MAX_OFFSET, "{dx}");

        let dx = fit_axis(|k| cost(-k)).unwrap();
        assert!(dx < -0.85 && dx >= -MAX_OFFSET, "{dx}");
    }

    #[test]
    fn refit_rejects_costs_without_a_minimum() {
        assert_eq!(fit_axis(|k| -k), None);
        assert_eq!(fit_axis(|k| 2.0 - k.abs()), None);
        assert_eq!(fit_axis(|_| 3.0), None);
        assert_eq!(fit_axis(|_| f32::NAN), None);
    }

    #[test]
    fn integer_shift_of_mirrored_texture_is_recovered() {
        let width = 24;
        let height = 16;
        // Texture mirrored about column 10 so the costs at +-1 are equal.
        let left: Vec<f32> = (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| {
                    let d = (x as i64 - 10).unsigned_abs() as usize;
                    ((d * d + 3 * y) % 17) as f32
                })
            })
            .collect();
        // right(x) = left(x - 2): disparity +2.
        let right: Vec<f32> = (0..height)
            .flat_map(|y| {
                let left = &left;
                (0..width).map(move |x| if x >= 2 { left[y * width + x - 2] } else { 0.0 })
            })
            .collect();
        let lv = ImageView::from_slice(&left, width, height).unwrap();
        let rv = ImageView::from_slice(&right, width, height).unwrap();
        let ctx = PixelContext {
            reference: Sampler::new(lv, Interpolation::Bicubic, EdgeExtension::Zero),
            search: Sampler::new(rv, Interpolation::Bicubic, EdgeExtension::Zero),
            window: WindowSize::new(5, 5),
            axes: Axes {
                horizontal: true,
                vertical: false,
            },
        };
        let offset = refine_pixel(&ctx, 10, 8, (2, 0)).unwrap();
        assert!(offset.dx.abs() < 1e-6);
        assert_eq!(offset.dy, 0.0);

        let flat = vec![4.0f32; width * height];
        let fv = ImageView::from_slice(&flat, width, height).unwrap();
        let flat_ctx = PixelContext {
            reference: Sampler::new(fv, Interpolation::Bicubic, EdgeExtension::Clamp),
            search: Sampler::new(fv, Interpolation::Bicubic, EdgeExtension::Clamp),
            ..ctx
        };
        assert_eq!(refine_pixel(&flat_ctx, 10, 8, (0, 0)), Err(Rejection::FlatCost));
    }
}

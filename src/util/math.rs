//! Numeric helpers shared by the pre-filters and estimators.

/// Radius of a sampled Gaussian kernel covering three standard deviations.
pub(crate) fn gaussian_radius(sigma: f32) -> usize {
    ((3.0 * sigma).ceil() as usize).max(1)
}

/// Sampled, unit-sum Gaussian kernel of length `2 * radius + 1`.
pub(crate) fn gaussian_kernel(sigma: f32, radius: usize) -> Vec<f32> {
    let denom = 2.0 * f64::from(sigma) * f64::from(sigma);
    let r = radius as isize;
    let raw: Vec<f64> = (-r..=r)
        .map(|t| (-((t * t) as f64) / denom).exp())
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.iter().map(|&v| (v / sum) as f32).collect()
}

/// Sampled second derivative of a Gaussian, corrected to zero sum so that a
/// constant signal has no response.
pub(crate) fn gaussian_second_derivative_kernel(sigma: f32, radius: usize) -> Vec<f32> {
    let s2 = f64::from(sigma) * f64::from(sigma);
    let r = radius as isize;
    let gauss: Vec<f64> = (-r..=r)
        .map(|t| (-((t * t) as f64) / (2.0 * s2)).exp())
        .collect();
    let norm: f64 = gauss.iter().sum();
    let raw: Vec<f64> = (-r..=r)
        .zip(gauss.iter())
        .map(|(t, g)| ((t * t) as f64 - s2) / (s2 * s2) * g / norm)
        .collect();
    let mean = raw.iter().sum::<f64>() / raw.len() as f64;
    raw.iter().map(|&v| (v - mean) as f32).collect()
}

/// Rounds a seed disparity component to the integer grid.
///
/// Returns `None` for non-finite values or values outside the `i32` range.
pub(crate) fn round_seed(value: f32) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if rounded < i32::MIN as f32 || rounded > i32::MAX as f32 {
        return None;
    }
    Some(rounded as i32)
}

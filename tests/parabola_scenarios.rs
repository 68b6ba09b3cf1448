use stereo_subpixel::lowlevel::parabola_vertex_offset;
use stereo_subpixel::{
    refine_disparity, Disparity, DisparityField, EdgeExtension, Estimator, ImageView,
    PreFilterConfig, PreFilterKind, SubpixelConfig,
};

const BLOB: usize = 41;

fn blob(x: f32, y: f32) -> f32 {
    let dx = x - 20.0;
    let dy = y - 20.0;
    100.0 + 80.0 * (-(dx * dx + dy * dy) / 18.0).exp()
}

fn sample(width: usize, height: usize, f: impl Fn(f32, f32) -> f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            out.push(f(x as f32, y as f32));
        }
    }
    out
}

fn no_prefilter() -> PreFilterConfig {
    PreFilterConfig {
        kind: PreFilterKind::None,
        scale: 1.0,
    }
}

#[test]
fn half_pixel_shift_is_recovered() {
    let left = sample(BLOB, BLOB, blob);
    let right = sample(BLOB, BLOB, |x, y| blob(x - 0.5, y));
    let seed = DisparityField::filled(BLOB, BLOB, Disparity::valid(0.0, 0.0)).unwrap();
    let cfg = SubpixelConfig {
        prefilter: no_prefilter(),
        ..SubpixelConfig::default()
    };
    let out = refine_disparity(
        &seed,
        ImageView::from_slice(&left, BLOB, BLOB).unwrap(),
        ImageView::from_slice(&right, BLOB, BLOB).unwrap(),
        &cfg,
    )
    .unwrap();

    let center = out.get(20, 20).unwrap();
    assert!(center.is_valid());
    assert!((center.dx - 0.5).abs() < 1e-3, "{center:?}");
    assert!(center.dy.abs() < 1e-3, "{center:?}");

    for y in 16..=24 {
        for x in 16..=24 {
            let d = out.get(x, y).unwrap();
            assert!(d.is_valid(), "({x}, {y})");
            assert!((d.dx - 0.5).abs() < 0.05, "({x}, {y}): {d:?}");
            assert!(d.dy.abs() < 0.05, "({x}, {y}): {d:?}");
        }
    }
}

#[test]
fn constant_images_are_invalid_for_every_estimator() {
    let flat = vec![50u8; 24 * 20];
    let view = ImageView::from_slice(&flat, 24, 20).unwrap();
    let seed = DisparityField::filled(24, 20, Disparity::valid(1.0, 0.0)).unwrap();
    for estimator in [Estimator::Parabola, Estimator::Affine, Estimator::AffineEm] {
        let cfg = SubpixelConfig {
            estimator,
            edge_extension: EdgeExtension::Clamp,
            ..SubpixelConfig::default()
        };
        let out = refine_disparity(&seed, view, view, &cfg).unwrap();
        assert_eq!(out.valid_count(), 0, "{estimator:?}");
        // Rejected pixels keep their seed vector.
        assert!(out.iter().all(|d| d.dx == 1.0 && d.dy == 0.0));
    }
}

#[test]
fn seeds_far_outside_the_image_terminate_invalid() {
    let width = 32;
    let height = 24;
    let data: Vec<u8> = (0..width * height)
        .map(|i| ((i * 37 + (i / width) * 11) % 251) as u8)
        .collect();
    let view = ImageView::from_slice(&data, width, height).unwrap();
    let seed = DisparityField::filled(width, height, Disparity::valid(-1000.0, 5.0)).unwrap();
    for estimator in [Estimator::Parabola, Estimator::Affine, Estimator::AffineEm] {
        let cfg = SubpixelConfig {
            estimator,
            ..SubpixelConfig::default()
        };
        let out = refine_disparity(&seed, view, view, &cfg).unwrap();
        assert_eq!(out.valid_count(), 0, "{estimator:?}");
        assert!(out.iter().all(|d| d.dx.is_finite() && d.dy.is_finite()));
    }
}

#[test]
fn vertex_offsets_are_bounded() {
    let cases = [
        (1.0, 0.0, 1.0),
        (5.0, 1.0, 0.0),
        (0.0, 1.0, 5.0),
        (1e9, 0.0, 0.0),
        (0.0, 0.0, 1e9),
        (2.0, 1.0, 2.0 + 1e-3),
    ];
    for (cm, c0, cp) in cases {
        if let Some(dx) = parabola_vertex_offset(cm, c0, cp) {
            assert!(dx > -1.0 && dx < 1.0, "({cm}, {c0}, {cp}) -> {dx}");
        }
    }
    assert_eq!(parabola_vertex_offset(1.0, 1.0, 1.0), None);
    assert_eq!(parabola_vertex_offset(0.0, 2.0, 0.0), None);
}

#[test]
fn vertical_shift_is_recovered_with_horizontal_disabled() {
    let left = sample(BLOB, BLOB, blob);
    let right = sample(BLOB, BLOB, |x, y| blob(x, y + 0.25));
    let seed = DisparityField::filled(BLOB, BLOB, Disparity::valid(0.0, 0.0)).unwrap();
    let cfg = SubpixelConfig {
        do_horizontal: false,
        prefilter: no_prefilter(),
        ..SubpixelConfig::default()
    };
    let out = refine_disparity(
        &seed,
        ImageView::from_slice(&left, BLOB, BLOB).unwrap(),
        ImageView::from_slice(&right, BLOB, BLOB).unwrap(),
        &cfg,
    )
    .unwrap();
    let d = out.get(20, 20).unwrap();
    assert!(d.is_valid());
    assert_eq!(d.dx, 0.0);
    assert!((d.dy + 0.25).abs() < 0.05, "{d:?}");
}

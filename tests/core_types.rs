use stereo_subpixel::lowlevel::{Sampler, WindowSize};
use stereo_subpixel::{
    Disparity, DisparityField, EdgeExtension, EmOptions, ImageF32, ImageView, Interpolation,
    OutlierPrior, OwnedImage, PreFilterConfig, PreFilterKind, SubpixelConfig, SubpixelError,
    SubpixelView,
};

#[test]
fn image_view_rejects_invalid_dimensions() {
    let data = [0u8; 4];

    let err = ImageView::from_slice(&data, 0, 1).err().unwrap();
    assert_eq!(
        err,
        SubpixelError::InvalidDimensions {
            width: 0,
            height: 1,
        }
    );

    let err = ImageView::from_slice(&data, 1, 0).err().unwrap();
    assert_eq!(
        err,
        SubpixelError::InvalidDimensions {
            width: 1,
            height: 0,
        }
    );
}

#[test]
fn image_view_rejects_invalid_stride() {
    let data = [0u8; 8];

    let err = ImageView::new(&data, 4, 1, 3).err().unwrap();
    assert_eq!(
        err,
        SubpixelError::InvalidStride {
            width: 4,
            stride: 3,
        }
    );
}

#[test]
fn image_view_rejects_small_buffer() {
    let data = [0u8; 3];

    let err = ImageView::new(&data, 2, 2, 2).err().unwrap();
    assert_eq!(err, SubpixelError::BufferTooSmall { needed: 4, got: 3 });
}

#[test]
fn strided_u16_view_converts_to_f32() {
    let data = [10u16, 20, 0, 30, 40, 0];
    let view = ImageView::new(&data, 2, 2, 3).unwrap();
    let image = ImageF32::from_view(view);
    assert_eq!(image.data(), &[10.0, 20.0, 30.0, 40.0]);
    assert_eq!(OwnedImage::new(vec![1u8; 6], 3, 2).unwrap().get(2, 1), Some(1));
}

#[test]
fn sampler_windows_follow_edge_policy() {
    let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
    let view = ImageView::from_slice(&data, 4, 4).unwrap();
    let size = WindowSize::new(3, 3);

    let zero = Sampler::new(view, Interpolation::Bicubic, EdgeExtension::Zero);
    let win = zero.window(0, 0, 0.0, 0.0, size);
    assert_eq!(win.get(0, 0), Some(0.0));
    assert_eq!(win.get(1, 1), Some(0.0));
    assert_eq!(win.get(2, 2), Some(5.0));

    let clamp = Sampler::new(view, Interpolation::Bicubic, EdgeExtension::Clamp);
    let win = clamp.window(3, 3, 1.0, 0.0, size);
    assert!(win.samples().iter().all(|&v| v == 11.0 || v == 15.0));
}

#[test]
fn disparity_field_reports_counts() {
    let mut field = DisparityField::filled(5, 4, Disparity::valid(2.0, 0.0)).unwrap();
    field.set(0, 0, Disparity::invalid(2.0, 0.0));
    assert_eq!(field.valid_count(), 19);
    assert_eq!(field.invalid_count(), 1);
    assert_eq!(field.rows().count(), 4);
    assert_eq!(
        DisparityField::new(3, 0).err(),
        Some(SubpixelError::InvalidDimensions {
            width: 3,
            height: 0,
        })
    );
}

#[test]
fn config_defaults() {
    let cfg = SubpixelConfig::default();
    assert_eq!((cfg.kernel_width, cfg.kernel_height), (7, 7));
    assert!(cfg.do_horizontal && cfg.do_vertical);
    assert!(!cfg.refine_both_images);
    assert_eq!(cfg.prefilter.kind, PreFilterKind::Log);
    assert_eq!(cfg.prefilter.scale, 1.4);
    assert_eq!(cfg.interpolation, Interpolation::Bicubic);
    assert_eq!(cfg.edge_extension, EdgeExtension::Zero);
    assert!(cfg.validate().is_ok());
}

#[test]
fn config_validation_rejects_bad_values() {
    let bad = [
        SubpixelConfig {
            kernel_width: 0,
            ..SubpixelConfig::default()
        },
        SubpixelConfig {
            kernel_height: 8,
            ..SubpixelConfig::default()
        },
        SubpixelConfig {
            kernel_width: usize::MAX,
            ..SubpixelConfig::default()
        },
        SubpixelConfig {
            kernel_width: (1 << (usize::BITS / 2)) + 1,
            kernel_height: (1 << (usize::BITS / 2)) + 1,
            ..SubpixelConfig::default()
        },
        SubpixelConfig {
            symmetric_tolerance: -1.0,
            ..SubpixelConfig::default()
        },
        SubpixelConfig {
            prefilter: PreFilterConfig {
                kind: PreFilterKind::Blur,
                scale: f32::NAN,
            },
            ..SubpixelConfig::default()
        },
        SubpixelConfig {
            em: EmOptions {
                min_inlier_fraction: 1.5,
                ..EmOptions::default()
            },
            ..SubpixelConfig::default()
        },
        SubpixelConfig {
            em: EmOptions {
                outlier_prior: OutlierPrior::Estimated {
                    initial_outlier_weight: 0.0,
                },
                ..EmOptions::default()
            },
            ..SubpixelConfig::default()
        },
    ];
    for cfg in bad {
        assert!(
            matches!(cfg.validate(), Err(SubpixelError::InvalidConfig(_))),
            "{cfg:?}"
        );
    }
}

#[test]
fn oversized_kernel_is_rejected_at_every_entry_point() {
    let data = [0u8; 16];
    let view = ImageView::from_slice(&data, 4, 4).unwrap();
    let seed = DisparityField::filled(4, 4, Disparity::valid(0.0, 0.0)).unwrap();
    let cfg = SubpixelConfig {
        kernel_width: usize::MAX,
        kernel_height: 3,
        ..SubpixelConfig::default()
    };
    let expected = SubpixelError::InvalidConfig("kernel_width * kernel_height is too large");

    assert_eq!(SubpixelView::new(view, view, cfg).err(), Some(expected.clone()));
    let filter = PreFilterConfig::default().build(EdgeExtension::Zero);
    assert_eq!(
        SubpixelView::with_prefilter(view, view, cfg, filter.as_ref()).err(),
        Some(expected.clone())
    );
    assert_eq!(
        stereo_subpixel::refine_disparity(&seed, view, view, &cfg).err(),
        Some(expected)
    );
}

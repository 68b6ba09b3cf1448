//! Stereo-subpixel refines integer stereo disparities to sub-pixel precision.
//!
//! Given a rectified stereo pair and a seed [`DisparityField`] from a coarse
//! integer correlator, every valid pixel is refined either by a closed-form
//! parabola through the SSD around its seed or by an affine Lucas-Kanade fit
//! with an EM inlier/outlier mixture. Pixels that cannot be refined are
//! flagged invalid instead of failing the call.
//!
//! Row parallelism is available through the `rayon` feature, structured
//! logging through `tracing`, and image loading through `image-io`.

pub mod cost;
pub mod disparity;
pub mod image;
pub mod lowlevel;
pub mod prefilter;
pub mod refine;
mod trace;
pub mod util;
pub mod view;

pub use disparity::{Disparity, DisparityField};
pub use image::sample::{EdgeExtension, Interpolation};
pub use image::{ImageF32, ImageView, OwnedImage, Pixel};
pub use prefilter::{GaussianBlur, LogFilter, NullFilter, PreFilter, PreFilterConfig, PreFilterKind};
pub use refine::affine::{AffineModel, EmOptions, OutlierPrior};
pub use refine::Rejection;
pub use util::{SubpixelError, SubpixelResult};
pub use view::{refine_disparity, Estimator, SubpixelConfig, SubpixelView};

#[cfg(feature = "image-io")]
pub use image::io::{load_gray_image, view_from_gray_image};

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use stereo_subpixel::{
    load_gray_image, AffineModel, Disparity, DisparityField, EdgeExtension, EmOptions, Estimator,
    Interpolation, OutlierPrior, PreFilterConfig, PreFilterKind, SubpixelConfig, SubpixelView,
};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Sub-pixel disparity refinement (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EstimatorConfig {
    Parabola,
    Affine,
    AffineEm,
}

impl From<EstimatorConfig> for Estimator {
    fn from(value: EstimatorConfig) -> Self {
        match value {
            EstimatorConfig::Parabola => Estimator::Parabola,
            EstimatorConfig::Affine => Estimator::Affine,
            EstimatorConfig::AffineEm => Estimator::AffineEm,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PreFilterKindConfig {
    None,
    Blur,
    Log,
}

impl From<PreFilterKindConfig> for PreFilterKind {
    fn from(value: PreFilterKindConfig) -> Self {
        match value {
            PreFilterKindConfig::None => PreFilterKind::None,
            PreFilterKindConfig::Blur => PreFilterKind::Blur,
            PreFilterKindConfig::Log => PreFilterKind::Log,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum InterpolationConfig {
    Nearest,
    Bilinear,
    Bicubic,
}

impl From<InterpolationConfig> for Interpolation {
    fn from(value: InterpolationConfig) -> Self {
        match value {
            InterpolationConfig::Nearest => Interpolation::Nearest,
            InterpolationConfig::Bilinear => Interpolation::Bilinear,
            InterpolationConfig::Bicubic => Interpolation::Bicubic,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EdgeExtensionConfig {
    Zero,
    Clamp,
}

impl From<EdgeExtensionConfig> for EdgeExtension {
    fn from(value: EdgeExtensionConfig) -> Self {
        match value {
            EdgeExtensionConfig::Zero => EdgeExtension::Zero,
            EdgeExtensionConfig::Clamp => EdgeExtension::Clamp,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AffineModelConfig {
    Translation,
    Affine,
}

impl From<AffineModelConfig> for AffineModel {
    fn from(value: AffineModelConfig) -> Self {
        match value {
            AffineModelConfig::Translation => AffineModel::Translation,
            AffineModelConfig::Affine => AffineModel::Affine,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PreFilterConfigJson {
    kind: PreFilterKindConfig,
    scale: f32,
}

impl Default for PreFilterConfigJson {
    fn default() -> Self {
        Self {
            kind: PreFilterKindConfig::Log,
            scale: PreFilterConfig::default().scale,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct EmOptionsJson {
    model: AffineModelConfig,
    max_iterations: usize,
    convergence_threshold: f32,
    min_inlier_fraction: f32,
    outlier_weight: f32,
    estimate_outlier_weight: bool,
    variance_floor_ratio: f32,
    seed_from_parabola: bool,
}

impl Default for EmOptionsJson {
    fn default() -> Self {
        let opts = EmOptions::default();
        let (outlier_weight, estimate_outlier_weight) = match opts.outlier_prior {
            OutlierPrior::Fixed { outlier_weight } => (outlier_weight, false),
            OutlierPrior::Estimated {
                initial_outlier_weight,
            } => (initial_outlier_weight, true),
        };
        Self {
            model: AffineModelConfig::Affine,
            max_iterations: opts.max_iterations,
            convergence_threshold: opts.convergence_threshold,
            min_inlier_fraction: opts.min_inlier_fraction,
            outlier_weight,
            estimate_outlier_weight,
            variance_floor_ratio: opts.variance_floor_ratio,
            seed_from_parabola: opts.seed_from_parabola,
        }
    }
}

impl From<EmOptionsJson> for EmOptions {
    fn from(value: EmOptionsJson) -> Self {
        let outlier_prior = if value.estimate_outlier_weight {
            OutlierPrior::Estimated {
                initial_outlier_weight: value.outlier_weight,
            }
        } else {
            OutlierPrior::Fixed {
                outlier_weight: value.outlier_weight,
            }
        };
        Self {
            model: value.model.into(),
            max_iterations: value.max_iterations,
            convergence_threshold: value.convergence_threshold,
            min_inlier_fraction: value.min_inlier_fraction,
            outlier_prior,
            variance_floor_ratio: value.variance_floor_ratio,
            seed_from_parabola: value.seed_from_parabola,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SubpixelConfigJson {
    kernel_width: usize,
    kernel_height: usize,
    do_horizontal: bool,
    do_vertical: bool,
    refine_both_images: bool,
    symmetric_tolerance: f32,
    estimator: EstimatorConfig,
    prefilter: PreFilterConfigJson,
    interpolation: InterpolationConfig,
    edge_extension: EdgeExtensionConfig,
    em: EmOptionsJson,
    parallel: bool,
    verbose: bool,
}

impl Default for SubpixelConfigJson {
    fn default() -> Self {
        let cfg = SubpixelConfig::default();
        Self {
            kernel_width: cfg.kernel_width,
            kernel_height: cfg.kernel_height,
            do_horizontal: cfg.do_horizontal,
            do_vertical: cfg.do_vertical,
            refine_both_images: cfg.refine_both_images,
            symmetric_tolerance: cfg.symmetric_tolerance,
            estimator: EstimatorConfig::Parabola,
            prefilter: PreFilterConfigJson::default(),
            interpolation: InterpolationConfig::Bicubic,
            edge_extension: EdgeExtensionConfig::Zero,
            em: EmOptionsJson::default(),
            parallel: cfg.parallel,
            verbose: cfg.verbose,
        }
    }
}

impl From<SubpixelConfigJson> for SubpixelConfig {
    fn from(value: SubpixelConfigJson) -> Self {
        Self {
            kernel_width: value.kernel_width,
            kernel_height: value.kernel_height,
            do_horizontal: value.do_horizontal,
            do_vertical: value.do_vertical,
            refine_both_images: value.refine_both_images,
            symmetric_tolerance: value.symmetric_tolerance,
            estimator: value.estimator.into(),
            prefilter: PreFilterConfig {
                kind: value.prefilter.kind.into(),
                scale: value.prefilter.scale,
            },
            interpolation: value.interpolation.into(),
            edge_extension: value.edge_extension.into(),
            em: value.em.into(),
            parallel: value.parallel,
            verbose: value.verbose,
        }
    }
}

/// Seed disparities: one vector for every pixel, or a field file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SeedConfig {
    Uniform([f32; 2]),
    File(String),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    left_path: String,
    right_path: String,
    seed: SeedConfig,
    output_path: Option<String>,
    subpixel: SubpixelConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            left_path: String::new(),
            right_path: String::new(),
            seed: SeedConfig::Uniform([0.0, 0.0]),
            output_path: None,
            subpixel: SubpixelConfigJson::default(),
        }
    }
}

/// Disparity field on disk, stored as parallel row-major arrays.
#[derive(Debug, Deserialize, Serialize)]
struct FieldRecord {
    width: usize,
    height: usize,
    dx: Vec<f32>,
    dy: Vec<f32>,
    valid: Vec<bool>,
}

impl FieldRecord {
    fn into_field(self) -> Result<DisparityField, Box<dyn std::error::Error>> {
        let len = self.width * self.height;
        if self.dx.len() != len || self.dy.len() != len || self.valid.len() != len {
            return Err(format!(
                "seed arrays must hold width * height = {len} entries"
            )
            .into());
        }
        let data = self
            .dx
            .iter()
            .zip(&self.dy)
            .zip(&self.valid)
            .map(|((&dx, &dy), &valid)| Disparity { dx, dy, valid })
            .collect();
        Ok(DisparityField::from_vec(data, self.width, self.height)?)
    }
}

impl From<&DisparityField> for FieldRecord {
    fn from(value: &DisparityField) -> Self {
        Self {
            width: value.width(),
            height: value.height(),
            dx: value.iter().map(|d| d.dx).collect(),
            dy: value.iter().map(|d| d.dy).collect(),
            valid: value.iter().map(|d| d.valid).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    valid: usize,
    invalid: usize,
    field: FieldRecord,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("stereo_subpixel=info".parse()?),
            )
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.left_path.is_empty() || config.right_path.is_empty() {
        return Err("left_path and right_path must be set in the config".into());
    }

    let left = load_gray_image(&config.left_path)?;
    let right = load_gray_image(&config.right_path)?;
    tracing::info!(
        width = left.width(),
        height = left.height(),
        "loaded stereo pair"
    );

    let seed = match config.seed {
        SeedConfig::Uniform([dx, dy]) => {
            DisparityField::filled(left.width(), left.height(), Disparity::valid(dx, dy))?
        }
        SeedConfig::File(path) => {
            let record: FieldRecord = serde_json::from_str(&fs::read_to_string(path)?)?;
            record.into_field()?
        }
    };

    let cfg = SubpixelConfig::from(config.subpixel);
    let view = SubpixelView::new(left.view(), right.view(), cfg)?;
    let refined = view.refine(&seed)?;

    let output = Output {
        valid: refined.valid_count(),
        invalid: refined.invalid_count(),
        field: FieldRecord::from(&refined),
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}

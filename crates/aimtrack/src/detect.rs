use std::path::{Path, PathBuf};
use std::sync::Arc;

use aimtrack_core::RgbImage;
use aimtrack_geometry::NalgebraGeometry;
use aimtrack_pipeline::{ConfigError, FrameReport, TrackerConfig, WorkerError};
use aimtrack_target::{Detection, TargetDetector};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum TrackError {
    #[error("failed to load image {}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convert an `image::RgbImage` into the core image type.
pub fn rgb_from_image(img: &image::RgbImage) -> RgbImage {
    RgbImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Decode any format supported by `image` into an RGB frame image.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage, TrackError> {
    let path = path.as_ref();
    let decoded = image::ImageReader::open(path)
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.with_guessed_format().map_err(image::ImageError::IoError))
        .and_then(|reader| reader.decode())
        .map_err(|source| TrackError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(rgb_from_image(&decoded.to_rgb8()))
}

/// Detector over the bundled geometry backend.
pub fn default_detector(config: &TrackerConfig) -> TargetDetector<NalgebraGeometry> {
    config.build_detector(Arc::new(NalgebraGeometry::new()))
}

/// Load one image and run detection on it.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn detect_file(
    path: impl AsRef<Path>,
    config: &TrackerConfig,
    arm_angle: f64,
) -> Result<Detection, TrackError> {
    let image = load_rgb(path)?;
    Ok(default_detector(config).detect(&image, arm_angle))
}

/// Per-image entry of the `aimtrack detect` report.
#[derive(Clone, Debug, Serialize)]
pub struct ImageReport {
    pub image: String,
    pub width: usize,
    pub height: usize,
    #[serde(flatten)]
    pub report: FrameReport,
}

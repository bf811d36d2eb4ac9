use aimtrack_core::{CameraIntrinsics, CornerRefinement, HsvRange};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::mount::MountGeometry;

/// Mask extraction parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionParams {
    pub hsv: HsvRange,
    /// Median filter radius; the kernel is `2 * blur_size + 1` pixels wide.
    pub blur_size: usize,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            hsv: HsvRange::default(),
            blur_size: 6,
        }
    }
}

/// Physical size of the target rectangle, in feet.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetDimensions {
    pub width: f64,
    pub height: f64,
}

impl TargetDimensions {
    /// Ideal `width / height` ratio.
    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Object points in top-left, top-right, bottom-left, bottom-right order,
    /// centred on the target with y pointing down.
    pub fn object_points(&self) -> [Point3<f64>; 4] {
        let (w, h) = (self.width / 2.0, self.height / 2.0);
        [
            Point3::new(-w, -h, 0.0),
            Point3::new(w, -h, 0.0),
            Point3::new(-w, h, 0.0),
            Point3::new(w, h, 0.0),
        ]
    }
}

impl Default for TargetDimensions {
    fn default() -> Self {
        Self {
            width: 20.0 / 12.0,
            height: 12.0 / 12.0,
        }
    }
}

/// Bounds used by the built-in validation rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationParams {
    /// Largest accepted |rotation about x|, degrees (exclusive).
    pub max_x_rotation_deg: f64,
    /// Largest accepted |rotation about z|, degrees (exclusive).
    pub max_z_rotation_deg: f64,
    /// Accepted horizontal distance, feet (both bounds exclusive).
    pub min_distance: f64,
    pub max_distance: f64,
    pub min_aspect_ratio_score: f64,
    pub min_rectangularity_width_score: f64,
    pub min_rectangularity_height_score: f64,
}

impl Default for ValidationParams {
    fn default() -> Self {
        Self {
            max_x_rotation_deg: 60.0,
            max_z_rotation_deg: 25.0,
            min_distance: 3.0,
            max_distance: 30.0,
            min_aspect_ratio_score: 10.0,
            min_rectangularity_width_score: 10.0,
            min_rectangularity_height_score: 10.0,
        }
    }
}

/// Configuration of [`TargetScorer`](crate::TargetScorer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetParams {
    /// Polygon simplification tolerance, pixels.
    pub approx_poly_epsilon: f64,
    /// Simplified contours must enclose strictly more than this, pixels².
    pub min_blob_area: f64,
    /// Sub-pixel refinement of the fitted corners; `null` skips it.
    pub corner_refinement: Option<CornerRefinement>,
    pub target: TargetDimensions,
    pub intrinsics: CameraIntrinsics,
    pub mount: MountGeometry,
    pub validation: ValidationParams,
}

impl Default for TargetParams {
    fn default() -> Self {
        Self {
            approx_poly_epsilon: 10.0,
            min_blob_area: 2000.0,
            corner_refinement: Some(CornerRefinement::default()),
            target: TargetDimensions::default(),
            intrinsics: CameraIntrinsics::default(),
            mount: MountGeometry::default(),
            validation: ValidationParams::default(),
        }
    }
}

/// Full detector configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub extraction: ExtractionParams,
    pub target: TargetParams,
}

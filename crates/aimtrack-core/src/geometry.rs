//! Contract for the image-geometry collaborator.
//!
//! Detection stages only talk to these primitives through [`VisionGeometry`],
//! so the backend can be the bundled pure-Rust implementation, a binding to a
//! native vision library, or an instrumented wrapper in tests.

use std::sync::Arc;

use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{GrayImage, RgbImage};

/// Ordered polygon vertices in image pixel coordinates.
pub type Polygon = Vec<Point2<f64>>;

/// Inclusive per-channel HSV bounds, OpenCV convention (H in 0..180).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub min: [u8; 3],
    pub max: [u8; 3],
}

impl HsvRange {
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.min[c] && hsv[c] <= self.max[c])
    }
}

impl Default for HsvRange {
    fn default() -> Self {
        Self {
            min: [0, 0, 99],
            max: [176, 255, 255],
        }
    }
}

/// Iterative sub-pixel corner search around coarse corner estimates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerRefinement {
    /// Half size of the search window, `[x, y]` pixels.
    pub half_window: [usize; 2],
    pub max_iterations: usize,
    /// Stop once a corner moves less than this many pixels in one step.
    pub epsilon: f64,
}

impl Default for CornerRefinement {
    fn default() -> Self {
        Self {
            half_window: [4, 10],
            max_iterations: 30,
            epsilon: 0.1,
        }
    }
}

/// Pinhole intrinsics plus `(k1, k2, p1, p2, k3)` distortion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Row-major camera matrix.
    pub matrix: [[f64; 3]; 3],
    pub distortion: [f64; 5],
}

impl CameraIntrinsics {
    /// Identity camera matrix, no distortion: image points are normalized
    /// coordinates.
    pub fn identity() -> Self {
        Self {
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            distortion: [0.0; 5],
        }
    }

    pub fn camera_matrix(&self) -> Matrix3<f64> {
        let m = &self.matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], //
            m[1][0], m[1][1], m[1][2], //
            m[2][0], m[2][1], m[2][2],
        )
    }

    pub fn has_distortion(&self) -> bool {
        self.distortion.iter().any(|&d| d != 0.0)
    }
}

impl Default for CameraIntrinsics {
    /// Calibration of the 640x480 aiming camera.
    fn default() -> Self {
        Self {
            matrix: [
                [591.6959855477264, 0.0, 319.5],
                [0.0, 611.9796964144819, 239.5],
                [0.0, 0.0, 1.0],
            ],
            distortion: [
                0.08164997482366798,
                -0.5661217323881856,
                -0.010531884927443303,
                -0.004479451330784382,
                1.0088761872766687,
            ],
        }
    }
}

/// Object pose in camera coordinates (x right, y down, z forward).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Rotation vector (axis * angle, radians).
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl CameraPose {
    pub fn is_finite(&self) -> bool {
        self.rotation.iter().chain(self.translation.iter()).all(|v| v.is_finite())
    }
}

/// Image-geometry primitives consumed by candidate extraction and scoring.
///
/// Implementations must not panic on degenerate input; they return empty
/// polygons, `None`, or non-finite values instead, which the scoring stage
/// turns into rejected targets.
pub trait VisionGeometry: Send + Sync {
    /// Convert `image` to HSV and keep pixels inside `range` (255) or not (0).
    fn threshold(&self, image: &RgbImage, range: &HsvRange) -> GrayImage;

    /// Median filter of a binary mask over a `(2 * radius + 1)^2` window.
    fn median_filter(&self, mask: &GrayImage, radius: usize) -> GrayImage;

    /// Outer contours of every 8-connected foreground blob.
    fn find_contours(&self, mask: &GrayImage) -> Vec<Polygon>;

    fn convex_hull(&self, points: &[Point2<f64>]) -> Polygon;

    /// Closed-polygon simplification with tolerance `epsilon` pixels.
    fn approx_polygon(&self, polygon: &[Point2<f64>], epsilon: f64) -> Polygon;

    /// Absolute enclosed area.
    fn contour_area(&self, polygon: &[Point2<f64>]) -> f64;

    /// Corners of the minimum-area enclosing rectangle, in boundary order.
    fn min_area_rect(&self, points: &[Point2<f64>]) -> Option<[Point2<f64>; 4]>;

    /// Pose of a known planar object from four image correspondences.
    fn solve_pnp(
        &self,
        object_points: &[Point3<f64>; 4],
        image_points: &[Point2<f64>; 4],
        intrinsics: &CameraIntrinsics,
    ) -> Option<CameraPose>;

    /// Move coarse `corners` onto the intensity corners of `image` nearby.
    ///
    /// Backends without sub-pixel support keep the default, which returns the
    /// corners unchanged.
    fn refine_corners(
        &self,
        image: &GrayImage,
        corners: [Point2<f64>; 4],
        params: &CornerRefinement,
    ) -> [Point2<f64>; 4] {
        let _ = (image, params);
        corners
    }
}

macro_rules! forward_geometry {
    ($ty:ty) => {
        impl<G: VisionGeometry + ?Sized> VisionGeometry for $ty {
            fn threshold(&self, image: &RgbImage, range: &HsvRange) -> GrayImage {
                (**self).threshold(image, range)
            }
            fn median_filter(&self, mask: &GrayImage, radius: usize) -> GrayImage {
                (**self).median_filter(mask, radius)
            }
            fn find_contours(&self, mask: &GrayImage) -> Vec<Polygon> {
                (**self).find_contours(mask)
            }
            fn convex_hull(&self, points: &[Point2<f64>]) -> Polygon {
                (**self).convex_hull(points)
            }
            fn approx_polygon(&self, polygon: &[Point2<f64>], epsilon: f64) -> Polygon {
                (**self).approx_polygon(polygon, epsilon)
            }
            fn contour_area(&self, polygon: &[Point2<f64>]) -> f64 {
                (**self).contour_area(polygon)
            }
            fn min_area_rect(&self, points: &[Point2<f64>]) -> Option<[Point2<f64>; 4]> {
                (**self).min_area_rect(points)
            }
            fn solve_pnp(
                &self,
                object_points: &[Point3<f64>; 4],
                image_points: &[Point2<f64>; 4],
                intrinsics: &CameraIntrinsics,
            ) -> Option<CameraPose> {
                (**self).solve_pnp(object_points, image_points, intrinsics)
            }
            fn refine_corners(
                &self,
                image: &GrayImage,
                corners: [Point2<f64>; 4],
                params: &CornerRefinement,
            ) -> [Point2<f64>; 4] {
                (**self).refine_corners(image, corners, params)
            }
        }
    };
}

forward_geometry!(&G);
forward_geometry!(Arc<G>);
forward_geometry!(Box<G>);

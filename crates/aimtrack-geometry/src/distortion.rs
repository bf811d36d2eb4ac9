//! Brown-Conrady lens model with `(k1, k2, p1, p2, k3)` coefficients.

use aimtrack_core::{CameraIntrinsics, CameraPose};
use nalgebra::{Point2, Point3, Rotation3, Vector3};

const UNDISTORT_ITERATIONS: usize = 20;

/// Apply the distortion model to a normalized image point.
pub fn distort_normalized(p: Point2<f64>, distortion: &[f64; 5]) -> Point2<f64> {
    let [k1, k2, p1, p2, k3] = *distortion;
    let (x, y) = (p.x, p.y);
    let r2 = x * x + y * y;
    let radial = 1.0 + ((k3 * r2 + k2) * r2 + k1) * r2;
    let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
    let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
    Point2::new(x * radial + dx, y * radial + dy)
}

/// Pixel coordinates to undistorted normalized coordinates.
///
/// The distortion model is inverted by fixed-point iteration. `None` if the
/// camera matrix is singular or the iteration diverges.
pub fn undistort_point(p: Point2<f64>, intrinsics: &CameraIntrinsics) -> Option<Point2<f64>> {
    let k_inv = intrinsics.camera_matrix().try_inverse()?;
    let v = k_inv * Vector3::new(p.x, p.y, 1.0);
    if v.z.abs() < f64::EPSILON {
        return None;
    }
    let (x0, y0) = (v.x / v.z, v.y / v.z);
    if !intrinsics.has_distortion() {
        return Some(Point2::new(x0, y0));
    }

    let [k1, k2, p1, p2, k3] = intrinsics.distortion;
    let (mut x, mut y) = (x0, y0);
    for _ in 0..UNDISTORT_ITERATIONS {
        let r2 = x * x + y * y;
        let icdist = 1.0 / (1.0 + ((k3 * r2 + k2) * r2 + k1) * r2);
        let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        x = (x0 - dx) * icdist;
        y = (y0 - dy) * icdist;
    }
    (x.is_finite() && y.is_finite()).then(|| Point2::new(x, y))
}

/// Project an object-frame point into the image. `None` behind the camera.
pub fn project_point(
    point: &Point3<f64>,
    pose: &CameraPose,
    intrinsics: &CameraIntrinsics,
) -> Option<Point2<f64>> {
    let pc = Rotation3::new(pose.rotation) * point.coords + pose.translation;
    if pc.z <= f64::EPSILON {
        return None;
    }
    let n = distort_normalized(Point2::new(pc.x / pc.z, pc.y / pc.z), &intrinsics.distortion);
    let px = intrinsics.camera_matrix() * Vector3::new(n.x, n.y, 1.0);
    Some(Point2::new(px.x / px.z, px.y / px.z))
}

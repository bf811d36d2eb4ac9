//! Planar four-point pose estimation.

use aimtrack_core::{CameraIntrinsics, CameraPose};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, SMatrix, SVector, Vector3, Vector6};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::distortion::undistort_point;
use crate::homography::homography_from_4pt;

/// Object points must satisfy `|z| <= PLANAR_TOLERANCE`.
const PLANAR_TOLERANCE: f64 = 1e-9;
const MIN_DEPTH: f64 = 1e-9;

type Residuals = SVector<f64, 8>;

/// Pose of a planar object (all points at `z = 0`) from four correspondences.
///
/// The homography between the object plane and the undistorted normalized
/// image is decomposed into `[r1 r2 t]`, the rotation is projected onto SO(3)
/// and, if `refine_iterations > 0`, the result is polished with
/// Levenberg-Marquardt on the normalized reprojection error. The translation
/// is always in front of the camera (`t.z > 0`).
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn solve_planar_pose(
    object_points: &[Point3<f64>; 4],
    image_points: &[Point2<f64>; 4],
    intrinsics: &CameraIntrinsics,
    refine_iterations: usize,
) -> Option<CameraPose> {
    if object_points.iter().any(|p| p.z.abs() > PLANAR_TOLERANCE) {
        log::debug!("non-planar object points");
        return None;
    }

    let mut normalized = [Point2::origin(); 4];
    for (n, p) in normalized.iter_mut().zip(image_points) {
        *n = undistort_point(*p, intrinsics)?;
    }
    let plane = object_points.map(|p| Point2::new(p.x, p.y));
    let h = homography_from_4pt(&plane, &normalized)?.h;

    let h1: Vector3<f64> = h.column(0).into_owned();
    let h2: Vector3<f64> = h.column(1).into_owned();
    let h3: Vector3<f64> = h.column(2).into_owned();

    let mut scale = 2.0 / (h1.norm() + h2.norm());
    if !scale.is_finite() {
        return None;
    }
    if h3.z * scale < 0.0 {
        scale = -scale;
    }
    let r1 = h1 * scale;
    let r2 = h2 * scale;
    let translation = h3 * scale;

    let m = Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]);
    let svd = m.svd(true, true);
    let (mut u, v_t) = (svd.u?, svd.v_t?);
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        u.column_mut(2).neg_mut();
        r = u * v_t;
    }

    let pose = CameraPose {
        rotation: Rotation3::from_matrix_unchecked(r).scaled_axis(),
        translation,
    };
    let pose = if refine_iterations > 0 {
        refine_pose(object_points, &normalized, pose, refine_iterations)
    } else {
        pose
    };

    pose.is_finite().then_some(pose)
}

fn residuals(
    object_points: &[Point3<f64>; 4],
    normalized: &[Point2<f64>; 4],
    params: &Vector6<f64>,
) -> Option<Residuals> {
    let rotation = Rotation3::new(Vector3::new(params[0], params[1], params[2]));
    let t = Vector3::new(params[3], params[4], params[5]);
    let mut r = Residuals::zeros();
    for (i, (obj, img)) in object_points.iter().zip(normalized).enumerate() {
        let pc = rotation * obj.coords + t;
        if pc.z <= MIN_DEPTH {
            return None;
        }
        r[2 * i] = pc.x / pc.z - img.x;
        r[2 * i + 1] = pc.y / pc.z - img.y;
    }
    Some(r)
}

fn to_params(pose: &CameraPose) -> Vector6<f64> {
    let (r, t) = (pose.rotation, pose.translation);
    Vector6::new(r.x, r.y, r.z, t.x, t.y, t.z)
}

fn to_pose(params: &Vector6<f64>) -> CameraPose {
    CameraPose {
        rotation: Vector3::new(params[0], params[1], params[2]),
        translation: Vector3::new(params[3], params[4], params[5]),
    }
}

/// Levenberg-Marquardt refinement of `initial` against undistorted
/// normalized image points. Never returns a pose with a higher error.
pub fn refine_pose(
    object_points: &[Point3<f64>; 4],
    normalized: &[Point2<f64>; 4],
    initial: CameraPose,
    iterations: usize,
) -> CameraPose {
    let mut x = to_params(&initial);
    let Some(mut r) = residuals(object_points, normalized, &x) else {
        return initial;
    };
    let mut cost = r.norm_squared();
    let mut lambda = 1e-3;

    for _ in 0..iterations {
        if cost < 1e-24 {
            break;
        }

        // Forward-difference Jacobian.
        let mut j = SMatrix::<f64, 8, 6>::zeros();
        for k in 0..6 {
            let step = 1e-7 * x[k].abs().max(1.0);
            let mut xp = x;
            xp[k] += step;
            let Some(rp) = residuals(object_points, normalized, &xp) else {
                return to_pose(&x);
            };
            j.set_column(k, &((rp - r) / step));
        }

        let jt = j.transpose();
        let mut a = jt * j;
        let g = jt * r;
        for d in 0..6 {
            a[(d, d)] += lambda * a[(d, d)].max(1e-12);
        }
        let Some(chol) = a.cholesky() else {
            lambda *= 10.0;
            continue;
        };
        let delta = chol.solve(&(-g));
        let candidate = x + delta;

        match residuals(object_points, normalized, &candidate) {
            Some(rc) if rc.norm_squared() < cost => {
                x = candidate;
                r = rc;
                cost = rc.norm_squared();
                lambda = (lambda * 0.1).max(1e-12);
                if delta.norm() < 1e-14 {
                    break;
                }
            }
            _ => lambda *= 10.0,
        }
    }

    to_pose(&x)
}

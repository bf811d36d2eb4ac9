use std::borrow::Cow;

use aimtrack_core::{CameraPose, Polygon};
use nalgebra::{Point2, Vector3};
use serde::Serialize;

use crate::corners::TargetCorners;
use crate::mount::MountGeometry;

/// Image-space measurements of a target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TargetShape {
    pub corners: TargetCorners,
    pub width_top: f64,
    pub width_bottom: f64,
    /// Mean of the top and bottom edge lengths.
    pub width: f64,
    pub height_left: f64,
    pub height_right: f64,
    /// Mean of the left and right edge lengths.
    pub height: f64,
    pub center: Point2<f64>,
}

impl TargetShape {
    pub fn from_corners(corners: TargetCorners) -> Self {
        let width_top = (corners.top_right - corners.top_left).norm();
        let width_bottom = (corners.bottom_right - corners.bottom_left).norm();
        let height_left = (corners.bottom_left - corners.top_left).norm();
        let height_right = (corners.bottom_right - corners.top_right).norm();
        Self {
            corners,
            width_top,
            width_bottom,
            width: (width_top + width_bottom) / 2.0,
            height_left,
            height_right,
            height: (height_left + height_right) / 2.0,
            center: corners.centroid(),
        }
    }
}

/// Target pose relative to the robot, in feet and radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TargetPose {
    /// Pose as returned by the solver, camera frame (y down).
    pub camera: CameraPose,
    /// Robot frame, x right, y up, z forward.
    pub position: Vector3<f64>,
    /// Rotation vector with the arm angle folded into x.
    pub rotation: Vector3<f64>,
    /// Distance in the horizontal (x, z) plane.
    pub distance: f64,
    /// Heading correction, `atan(x / z)`.
    pub x_goal_angle: f64,
    /// Elevation correction, `atan(y / z)`.
    pub y_goal_angle: f64,
}

impl TargetPose {
    pub fn from_camera(camera: CameraPose, mount: &MountGeometry, arm_angle: f64) -> Self {
        let (position, rotation) = mount.camera_to_robot(&camera, arm_angle);
        let (x, y, z) = (position.x, position.y, position.z);
        Self {
            camera,
            position,
            rotation,
            distance: (x * x + z * z).sqrt(),
            x_goal_angle: (x / z).atan(),
            y_goal_angle: (y / z).atan(),
        }
    }
}

/// Outcome of evaluating one candidate.
///
/// `shape` is present once the area gate and corner labeling succeeded,
/// `pose` once the pose solve succeeded. `score` is set only for targets that
/// passed every validation rule.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Target {
    /// Simplified polygon.
    pub contour: Polygon,
    pub area: f64,
    pub shape: Option<TargetShape>,
    pub pose: Option<TargetPose>,
    pub valid: bool,
    /// Name of the first failed rule, `None` for valid targets.
    pub failed_validator: Option<Cow<'static, str>>,
    pub score: Option<f64>,
}

impl Target {
    pub(crate) fn rejected(
        contour: Polygon,
        area: f64,
        shape: Option<TargetShape>,
        pose: Option<TargetPose>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            contour,
            area,
            shape,
            pose,
            valid: false,
            failed_validator: Some(reason.into()),
            score: None,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn failed_validator(&self) -> Option<&str> {
        self.failed_validator.as_deref()
    }

    pub fn distance(&self) -> Option<f64> {
        self.pose.map(|p| p.distance)
    }

    pub fn x_goal_angle(&self) -> Option<f64> {
        self.pose.map(|p| p.x_goal_angle)
    }

    pub fn y_goal_angle(&self) -> Option<f64> {
        self.pose.map(|p| p.y_goal_angle)
    }
}

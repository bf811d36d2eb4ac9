use aimtrack_core::CameraPose;
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Where the camera sits on the robot, in feet.
///
/// The camera rides on an arm that pivots about the robot's x axis. Offsets
/// are expressed with y pointing up.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountGeometry {
    /// Camera position relative to the arm axis, sideways.
    pub camera_x_offset: f64,
    /// Camera position relative to the arm axis, vertical.
    pub camera_y_offset: f64,
    /// Distance from the camera to the arm pivot along the arm.
    pub arm_length: f64,
    /// Pivot height above the robot's reference point.
    pub pivot_y_offset: f64,
    /// Pivot position behind the robot's reference point.
    pub pivot_z_offset: f64,
}

impl MountGeometry {
    /// Camera at the robot's reference point; only the y flip remains.
    pub fn zero() -> Self {
        Self {
            camera_x_offset: 0.0,
            camera_y_offset: 0.0,
            arm_length: 0.0,
            pivot_y_offset: 0.0,
            pivot_z_offset: 0.0,
        }
    }

    /// Express a camera-frame pose in the robot frame for the given arm angle.
    ///
    /// Returns `(position, rotation)`. The position chain is: flip y to point
    /// up, shift to the arm pivot, undo the arm rotation, shift to the robot
    /// centre. The arm angle is added to the x component of the rotation
    /// vector.
    pub fn camera_to_robot(&self, camera: &CameraPose, arm_angle: f64) -> (Vector3<f64>, Vector3<f64>) {
        let t = camera.translation;
        let mut position = Vector3::new(t.x, -t.y, t.z);
        position += Vector3::new(self.camera_x_offset, self.camera_y_offset, self.arm_length);
        position = Rotation3::from_axis_angle(&Vector3::x_axis(), -arm_angle) * position;
        position += Vector3::new(0.0, self.pivot_y_offset, -self.pivot_z_offset);

        let mut rotation = camera.rotation;
        rotation.x += arm_angle;
        (position, rotation)
    }
}

impl Default for MountGeometry {
    fn default() -> Self {
        Self {
            camera_x_offset: 10.25 / 12.0,
            camera_y_offset: -3.375 / 12.0,
            arm_length: 38.5 / 12.0,
            pivot_y_offset: 11.0 / 12.0,
            pivot_z_offset: 13.5 / 12.0,
        }
    }
}

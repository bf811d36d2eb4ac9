use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::params::TargetParams;
use crate::target::{TargetPose, TargetShape};

/// Map a ratio with ideal value 1 onto a 0-100 score.
///
/// Piecewise linear through (0, 0), (1, 100) and (2, 0), clamped to
/// `[0, 100]`. NaN stays NaN.
pub fn ratio_to_score(ratio: f64) -> f64 {
    (100.0 * (1.0 - (1.0 - ratio).abs())).clamp(0.0, 100.0)
}

/// Measured `width / height` against the ideal ratio.
pub fn aspect_ratio_score(shape: &TargetShape, ideal_aspect_ratio: f64) -> f64 {
    ratio_to_score(shape.width / shape.height / ideal_aspect_ratio)
}

/// Top edge length against bottom edge length.
pub fn rectangularity_width_score(shape: &TargetShape) -> f64 {
    ratio_to_score(shape.width_top / shape.width_bottom)
}

/// Left edge length against right edge length.
pub fn rectangularity_height_score(shape: &TargetShape) -> f64 {
    ratio_to_score(shape.height_left / shape.height_right)
}

fn meets(score: f64, min: f64) -> bool {
    score.is_finite() && score >= min
}

type CheckFn = dyn Fn(&TargetShape, &TargetPose) -> bool + Send + Sync;
type ScoreFn = dyn Fn(&TargetShape, &TargetPose) -> f64 + Send + Sync;

/// One named accept/reject rule. Rules run in list order and the first
/// failure stops evaluation.
#[derive(Clone)]
pub enum ValidationRule {
    /// |rotation.z| below `max_z_rotation_deg`.
    ZAngle,
    /// |rotation.x| below `max_x_rotation_deg`.
    XAngle,
    /// Distance strictly inside `(min_distance, max_distance)`.
    Distance,
    AspectRatio,
    RectangularityHeight,
    RectangularityWidth,
    Custom {
        name: Cow<'static, str>,
        check: Arc<CheckFn>,
    },
}

impl ValidationRule {
    /// Built-in rules in evaluation order.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::ZAngle,
            Self::XAngle,
            Self::Distance,
            Self::AspectRatio,
            Self::RectangularityHeight,
            Self::RectangularityWidth,
        ]
    }

    pub fn custom(
        name: impl Into<Cow<'static, str>>,
        check: impl Fn(&TargetShape, &TargetPose) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Name reported in [`Target::failed_validator`](crate::Target::failed_validator).
    pub fn name(&self) -> Cow<'static, str> {
        match self {
            Self::ZAngle => Cow::Borrowed("Z Angle"),
            Self::XAngle => Cow::Borrowed("X Angle"),
            Self::Distance => Cow::Borrowed("Distance"),
            Self::AspectRatio => Cow::Borrowed("Aspect Ratio"),
            Self::RectangularityHeight => Cow::Borrowed("Rectangularity Height"),
            Self::RectangularityWidth => Cow::Borrowed("Rectangularity Width"),
            Self::Custom { name, .. } => name.clone(),
        }
    }

    pub fn check(&self, shape: &TargetShape, pose: &TargetPose, params: &TargetParams) -> bool {
        let v = &params.validation;
        match self {
            Self::ZAngle => pose.rotation.z.abs() < v.max_z_rotation_deg.to_radians(),
            Self::XAngle => pose.rotation.x.abs() < v.max_x_rotation_deg.to_radians(),
            Self::Distance => pose.distance > v.min_distance && pose.distance < v.max_distance,
            Self::AspectRatio => meets(
                aspect_ratio_score(shape, params.target.aspect_ratio()),
                v.min_aspect_ratio_score,
            ),
            Self::RectangularityHeight => meets(
                rectangularity_height_score(shape),
                v.min_rectangularity_height_score,
            ),
            Self::RectangularityWidth => meets(
                rectangularity_width_score(shape),
                v.min_rectangularity_width_score,
            ),
            Self::Custom { check, .. } => check(shape, pose),
        }
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidationRule({})", self.name())
    }
}

/// One scoring function; the composite score is the mean of all of them.
#[derive(Clone)]
pub enum ScoreRule {
    /// `3 - |x_goal_angle|`: prefers targets straight ahead.
    AimAngle,
    Custom {
        name: Cow<'static, str>,
        score: Arc<ScoreFn>,
    },
}

impl ScoreRule {
    pub fn defaults() -> Vec<Self> {
        vec![Self::AimAngle]
    }

    pub fn custom(
        name: impl Into<Cow<'static, str>>,
        score: impl Fn(&TargetShape, &TargetPose) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            name: name.into(),
            score: Arc::new(score),
        }
    }

    pub fn name(&self) -> Cow<'static, str> {
        match self {
            Self::AimAngle => Cow::Borrowed("Aim Angle"),
            Self::Custom { name, .. } => name.clone(),
        }
    }

    pub fn score(&self, shape: &TargetShape, pose: &TargetPose) -> f64 {
        match self {
            Self::AimAngle => 3.0 - pose.x_goal_angle.abs(),
            Self::Custom { score, .. } => score(shape, pose),
        }
    }
}

impl fmt::Debug for ScoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScoreRule({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corners::TargetCorners;
    use crate::mount::MountGeometry;
    use aimtrack_core::CameraPose;
    use nalgebra::{Point2, Vector3};

    fn shape(w_top: f64, w_bottom: f64, h_left: f64, h_right: f64) -> TargetShape {
        let corners = TargetCorners {
            top_left: Point2::new(0.0, 0.0),
            top_right: Point2::new(1.0, 0.0),
            bottom_left: Point2::new(0.0, 1.0),
            bottom_right: Point2::new(1.0, 1.0),
        };
        TargetShape {
            corners,
            width_top: w_top,
            width_bottom: w_bottom,
            width: (w_top + w_bottom) / 2.0,
            height_left: h_left,
            height_right: h_right,
            height: (h_left + h_right) / 2.0,
            center: Point2::new(0.5, 0.5),
        }
    }

    fn pose(rotation: Vector3<f64>, translation: Vector3<f64>) -> TargetPose {
        TargetPose::from_camera(
            CameraPose {
                rotation,
                translation,
            },
            &MountGeometry::zero(),
            0.0,
        )
    }

    #[test]
    fn ratio_to_score_shape() {
        assert_eq!(ratio_to_score(1.0), 100.0);
        assert_eq!(ratio_to_score(0.5), 50.0);
        assert_eq!(ratio_to_score(1.5), 50.0);
        assert_eq!(ratio_to_score(0.0), 0.0);
        assert_eq!(ratio_to_score(2.5), 0.0);
        assert_eq!(ratio_to_score(f64::INFINITY), 0.0);
        assert!(ratio_to_score(f64::NAN).is_nan());
    }

    #[test]
    fn angle_and_distance_bounds_are_exclusive() {
        let params = TargetParams::default();
        let s = shape(100.0, 100.0, 60.0, 60.0);

        let z_limit = params.validation.max_z_rotation_deg.to_radians();
        let at_limit = pose(Vector3::new(0.0, 0.0, z_limit), Vector3::new(0.0, 0.0, 10.0));
        assert!(!ValidationRule::ZAngle.check(&s, &at_limit, &params));
        let inside = pose(Vector3::new(0.0, 0.0, z_limit * 0.99), Vector3::new(0.0, 0.0, 10.0));
        assert!(ValidationRule::ZAngle.check(&s, &inside, &params));

        let at_max = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 30.0));
        assert!(!ValidationRule::Distance.check(&s, &at_max, &params));
        let too_close = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 2.0));
        assert!(!ValidationRule::Distance.check(&s, &too_close, &params));
        let ok = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 12.0));
        assert!(ValidationRule::Distance.check(&s, &ok, &params));
    }

    #[test]
    fn shape_rules_use_minimum_scores() {
        let params = TargetParams::default();
        let p = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 10.0));

        // Ideal 20:12 aspect.
        let good = shape(100.0, 100.0, 60.0, 60.0);
        for rule in ValidationRule::defaults() {
            assert!(rule.check(&good, &p, &params), "{rule:?}");
        }

        let trapezoid = shape(100.0, 5.0, 60.0, 60.0);
        assert!(!ValidationRule::RectangularityWidth.check(&trapezoid, &p, &params));
        let degenerate = shape(100.0, 100.0, 0.0, 0.0);
        assert!(!ValidationRule::AspectRatio.check(&degenerate, &p, &params));
        assert!(!ValidationRule::RectangularityHeight.check(&degenerate, &p, &params));
    }

    #[test]
    fn aim_angle_prefers_centred_targets() {
        let s = shape(1.0, 1.0, 1.0, 1.0);
        let centred = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 10.0));
        let off = pose(Vector3::zeros(), Vector3::new(5.0, 0.0, 10.0));
        assert_eq!(ScoreRule::AimAngle.score(&s, &centred), 3.0);
        assert!(ScoreRule::AimAngle.score(&s, &off) < 3.0);
    }

    #[test]
    fn rule_names() {
        let names: Vec<_> = ValidationRule::defaults().iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            [
                "Z Angle",
                "X Angle",
                "Distance",
                "Aspect Ratio",
                "Rectangularity Height",
                "Rectangularity Width"
            ]
        );
        assert_eq!(ValidationRule::custom("Mine", |_, _| true).name(), "Mine");
    }
}

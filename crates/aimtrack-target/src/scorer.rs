use aimtrack_core::{GrayImage, VisionGeometry};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::corners::{snap_to_vertices, TargetCorners};
use crate::extractor::Candidate;
use crate::params::TargetParams;
use crate::reject;
use crate::target::{Target, TargetPose, TargetShape};
use crate::validation::{ScoreRule, ValidationRule};

/// Evaluates candidates into validated-or-rejected [`Target`]s.
#[derive(Clone, Debug)]
pub struct TargetScorer<G> {
    geometry: G,
    params: TargetParams,
    validators: Vec<ValidationRule>,
    scorers: Vec<ScoreRule>,
}

impl<G: VisionGeometry> TargetScorer<G> {
    /// Scorer with the built-in validation and scoring rules.
    pub fn new(geometry: G, params: TargetParams) -> Self {
        Self {
            geometry,
            params,
            validators: ValidationRule::defaults(),
            scorers: ScoreRule::defaults(),
        }
    }

    /// Replace the validation rules. They run in the given order.
    pub fn with_validators(mut self, validators: Vec<ValidationRule>) -> Self {
        self.validators = validators;
        self
    }

    /// Replace the scoring rules. An empty list scores every valid target 0.
    pub fn with_scorers(mut self, scorers: Vec<ScoreRule>) -> Self {
        self.scorers = scorers;
        self
    }

    #[inline]
    pub fn params(&self) -> &TargetParams {
        &self.params
    }

    pub fn validators(&self) -> &[ValidationRule] {
        &self.validators
    }

    pub fn scorers(&self) -> &[ScoreRule] {
        &self.scorers
    }

    /// Evaluate one candidate with the arm at `arm_angle` radians.
    ///
    /// Never fails: degenerate geometry yields an invalid target with the
    /// reason in `failed_validator`. Corners stay where the rectangle fit put
    /// them; use [`evaluate_in`](Self::evaluate_in) to refine them against
    /// the source image.
    pub fn evaluate(&self, candidate: &Candidate, arm_angle: f64) -> Target {
        self.evaluate_in(None, candidate, arm_angle)
    }

    /// Like [`evaluate`](Self::evaluate), refining the snapped corners on
    /// `image` (the grayscale source frame) when corner refinement is on.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, image, candidate))
    )]
    pub fn evaluate_in(
        &self,
        image: Option<&GrayImage>,
        candidate: &Candidate,
        arm_angle: f64,
    ) -> Target {
        let p = &self.params;
        let contour = self
            .geometry
            .approx_polygon(&candidate.points, p.approx_poly_epsilon);
        let area = self.geometry.contour_area(&contour);
        if !(area > p.min_blob_area) {
            return Target::rejected(contour, area, None, None, reject::AREA);
        }

        let Some(corners) = self
            .geometry
            .min_area_rect(&contour)
            .and_then(|rect| snap_to_vertices(rect, &contour))
            .map(|snapped| match (image, &p.corner_refinement) {
                (Some(image), Some(refinement)) => {
                    self.geometry.refine_corners(image, snapped, refinement)
                }
                _ => snapped,
            })
            .and_then(TargetCorners::label)
        else {
            log::trace!("rectangle fit failed for contour of area {area:.1}");
            return Target::rejected(contour, area, None, None, reject::CORNERS);
        };
        let shape = TargetShape::from_corners(corners);

        let Some(camera) = self
            .geometry
            .solve_pnp(&p.target.object_points(), &corners.to_array(), &p.intrinsics)
            .filter(|pose| pose.is_finite())
        else {
            return Target::rejected(contour, area, Some(shape), None, reject::POSE);
        };
        let pose = TargetPose::from_camera(camera, &p.mount, arm_angle);

        if let Some(rule) = self
            .validators
            .iter()
            .find(|rule| !rule.check(&shape, &pose, p))
        {
            return Target::rejected(contour, area, Some(shape), Some(pose), rule.name());
        }

        let score = if self.scorers.is_empty() {
            0.0
        } else {
            let mut total = 0.0;
            for rule in &self.scorers {
                let s = rule.score(&shape, &pose);
                if !s.is_finite() {
                    return Target::rejected(contour, area, Some(shape), Some(pose), reject::SCORE);
                }
                total += s;
            }
            total / self.scorers.len() as f64
        };

        Target {
            contour,
            area,
            shape: Some(shape),
            pose: Some(pose),
            valid: true,
            failed_validator: None,
            score: Some(score),
        }
    }
}

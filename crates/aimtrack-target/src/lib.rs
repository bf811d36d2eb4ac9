//! Target detection for the aimtrack pipeline.
//!
//! Current flow, per frame:
//! - HSV threshold, median filter and contour extraction ([`CandidateExtractor`]),
//! - per-candidate simplification, area gate, corner labeling, pose solve and
//!   the camera-to-robot transform ([`TargetScorer`]),
//! - ordered fail-fast validation ([`ValidationRule`]) and scoring
//!   ([`ScoreRule`]),
//! - best-target selection ([`select_best`]).
//!
//! Image-geometry primitives come from a [`VisionGeometry`](aimtrack_core::VisionGeometry)
//! implementation supplied by the caller.

mod corners;
mod detector;
mod extractor;
mod mount;
mod params;
mod scorer;
mod target;
mod validation;

pub use corners::{snap_to_vertices, TargetCorners};
pub use detector::{select_best, Detection, TargetDetector};
pub use extractor::{Candidate, CandidateExtractor};
pub use mount::MountGeometry;
pub use params::{DetectorParams, ExtractionParams, TargetDimensions, TargetParams, ValidationParams};
pub use scorer::TargetScorer;
pub use target::{Target, TargetPose, TargetShape};
pub use validation::{
    aspect_ratio_score, ratio_to_score, rectangularity_height_score, rectangularity_width_score,
    ScoreRule, ValidationRule,
};

/// Failure reasons that are not named validation rules.
pub mod reject {
    /// Simplified contour area at or below the configured minimum.
    pub const AREA: &str = "Area";
    /// Rectangle fit failed or two labeled corners coincide.
    pub const CORNERS: &str = "Corners";
    /// Pose solver returned nothing or non-finite values.
    pub const POSE: &str = "Pose";
    /// Composite score is not finite.
    pub const SCORE: &str = "Score";
}

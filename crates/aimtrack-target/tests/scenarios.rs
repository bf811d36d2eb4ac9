use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aimtrack_core::{
    CameraIntrinsics, CameraPose, CornerRefinement, GrayImage, HsvRange, Polygon, RgbImage,
    VisionGeometry,
};
use aimtrack_geometry::{project_point, NalgebraGeometry};
use aimtrack_target::{
    reject, Candidate, DetectorParams, MountGeometry, ScoreRule, TargetDetector,
    TargetDimensions, TargetParams, TargetScorer, ValidationParams, ValidationRule,
};
use approx::assert_abs_diff_eq;
use nalgebra::{Point2, Point3, Vector3};

/// Counts the expensive calls and can force the pose solver to fail.
#[derive(Default)]
struct CountingGeometry {
    inner: NalgebraGeometry,
    rect_calls: AtomicUsize,
    pnp_calls: AtomicUsize,
    refine_calls: AtomicUsize,
    fail_pnp: bool,
    /// Non-zero: refinement scales corners about the origin by `1 + grow`
    /// instead of looking at the image.
    refine_grow: f64,
}

impl VisionGeometry for CountingGeometry {
    fn threshold(&self, image: &RgbImage, range: &HsvRange) -> GrayImage {
        self.inner.threshold(image, range)
    }
    fn median_filter(&self, mask: &GrayImage, radius: usize) -> GrayImage {
        self.inner.median_filter(mask, radius)
    }
    fn find_contours(&self, mask: &GrayImage) -> Vec<Polygon> {
        self.inner.find_contours(mask)
    }
    fn convex_hull(&self, points: &[Point2<f64>]) -> Polygon {
        self.inner.convex_hull(points)
    }
    fn approx_polygon(&self, polygon: &[Point2<f64>], epsilon: f64) -> Polygon {
        self.inner.approx_polygon(polygon, epsilon)
    }
    fn contour_area(&self, polygon: &[Point2<f64>]) -> f64 {
        self.inner.contour_area(polygon)
    }
    fn min_area_rect(&self, points: &[Point2<f64>]) -> Option<[Point2<f64>; 4]> {
        self.rect_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.min_area_rect(points)
    }
    fn solve_pnp(
        &self,
        object_points: &[Point3<f64>; 4],
        image_points: &[Point2<f64>; 4],
        intrinsics: &CameraIntrinsics,
    ) -> Option<CameraPose> {
        self.pnp_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pnp {
            return None;
        }
        self.inner.solve_pnp(object_points, image_points, intrinsics)
    }
    fn refine_corners(
        &self,
        image: &GrayImage,
        corners: [Point2<f64>; 4],
        params: &CornerRefinement,
    ) -> [Point2<f64>; 4] {
        self.refine_calls.fetch_add(1, Ordering::SeqCst);
        if self.refine_grow == 0.0 {
            return self.inner.refine_corners(image, corners, params);
        }
        corners.map(|p| Point2::from(p.coords * (1.0 + self.refine_grow)))
    }
}

fn square(half: f64) -> Candidate {
    Candidate::new(vec![
        Point2::new(-half, -half),
        Point2::new(half, -half),
        Point2::new(half, half),
        Point2::new(-half, half),
    ])
}

/// Identity camera, no distortion, camera at the robot centre and a 100x100
/// target: an image square of the same size sits at distance 1.
fn unit_distance_params() -> TargetParams {
    TargetParams {
        target: TargetDimensions {
            width: 100.0,
            height: 100.0,
        },
        intrinsics: CameraIntrinsics::identity(),
        mount: MountGeometry::zero(),
        validation: ValidationParams {
            min_distance: 0.5,
            max_distance: 2.0,
            ..ValidationParams::default()
        },
        ..TargetParams::default()
    }
}

#[test]
fn small_candidate_is_rejected_by_area() {
    let geometry = Arc::new(CountingGeometry::default());
    let scorer = TargetScorer::new(Arc::clone(&geometry), TargetParams::default());

    // 40x40 px survives simplification but is below the 2000 px² gate.
    let target = scorer.evaluate(&square(20.0), 0.0);
    assert!(!target.valid);
    assert_eq!(target.failed_validator(), Some(reject::AREA));
    assert_abs_diff_eq!(target.area, 1600.0, epsilon = 1e-9);
    assert!(target.shape.is_none());
    assert!(target.pose.is_none());
    assert!(target.score.is_none());

    assert_eq!(geometry.rect_calls.load(Ordering::SeqCst), 0);
    assert_eq!(geometry.pnp_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn empty_and_degenerate_candidates_do_not_panic() {
    let scorer = TargetScorer::new(NalgebraGeometry::new(), TargetParams::default());
    for points in [
        Vec::new(),
        vec![Point2::new(1.0, 1.0)],
        vec![Point2::new(f64::NAN, 0.0), Point2::new(0.0, f64::INFINITY)],
    ] {
        let target = scorer.evaluate(&Candidate::new(points), 0.0);
        assert!(!target.valid);
    }
}

#[test]
fn image_sized_target_sits_at_unit_distance() {
    let scorer = TargetScorer::new(NalgebraGeometry::new(), unit_distance_params());
    let target = scorer.evaluate(&square(50.0), 0.0);

    assert!(target.valid, "failed: {:?}", target.failed_validator);
    let pose = target.pose.expect("pose");
    assert_abs_diff_eq!(pose.distance, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(pose.x_goal_angle, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(target.score.expect("score"), 3.0, epsilon = 1e-6);

    let shape = target.shape.expect("shape");
    assert_eq!(shape.corners.top_left, Point2::new(-50.0, -50.0));
    assert_eq!(shape.corners.bottom_right, Point2::new(50.0, 50.0));
}

#[test]
fn validation_stops_at_first_failure() {
    let calls: Arc<[AtomicUsize; 3]> = Arc::new(Default::default());
    let counting = |i: usize, pass: bool| {
        let calls = Arc::clone(&calls);
        ValidationRule::custom(format!("Rule {i}"), move |_, _| {
            calls[i].fetch_add(1, Ordering::SeqCst);
            pass
        })
    };

    let scorer = TargetScorer::new(NalgebraGeometry::new(), unit_distance_params()).with_validators(vec![
        counting(0, true),
        counting(1, false),
        counting(2, true),
    ]);
    let target = scorer.evaluate(&square(50.0), 0.0);

    assert!(!target.valid);
    assert_eq!(target.failed_validator(), Some("Rule 1"));
    assert!(target.pose.is_some());
    assert!(target.score.is_none());
    let counts: Vec<usize> = calls.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(counts, [1, 1, 0]);
}

#[test]
fn default_distance_rule_rejects_unit_distance() {
    let params = TargetParams {
        validation: ValidationParams::default(),
        ..unit_distance_params()
    };
    let target = TargetScorer::new(NalgebraGeometry::new(), params).evaluate(&square(50.0), 0.0);
    assert_eq!(target.failed_validator(), Some("Distance"));
}

#[test]
fn triangle_has_no_four_distinct_corners() {
    let geometry = Arc::new(CountingGeometry::default());
    let scorer = TargetScorer::new(Arc::clone(&geometry), TargetParams::default());
    let triangle = Candidate::new(vec![
        Point2::new(0.0, 0.0),
        Point2::new(200.0, 0.0),
        Point2::new(100.0, 150.0),
    ]);

    let target = scorer.evaluate(&triangle, 0.0);
    assert_eq!(target.failed_validator(), Some(reject::CORNERS));
    assert_abs_diff_eq!(target.area, 15000.0, epsilon = 1e-9);
    assert_eq!(geometry.pnp_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn pose_failure_is_reported() {
    let geometry = CountingGeometry {
        fail_pnp: true,
        ..CountingGeometry::default()
    };
    let target = TargetScorer::new(geometry, unit_distance_params()).evaluate(&square(50.0), 0.0);
    assert_eq!(target.failed_validator(), Some(reject::POSE));
    assert!(target.shape.is_some());
    assert!(target.pose.is_none());
}

#[test]
fn non_finite_score_invalidates() {
    let scorer = TargetScorer::new(NalgebraGeometry::new(), unit_distance_params())
        .with_scorers(vec![ScoreRule::AimAngle, ScoreRule::custom("Broken", |_, _| f64::NAN)]);
    let target = scorer.evaluate(&square(50.0), 0.0);
    assert!(!target.valid);
    assert_eq!(target.failed_validator(), Some(reject::SCORE));
}

#[test]
fn composite_score_is_the_mean() {
    let scorer = TargetScorer::new(NalgebraGeometry::new(), unit_distance_params())
        .with_scorers(vec![ScoreRule::AimAngle, ScoreRule::custom("Five", |_, _| 5.0)]);
    let target = scorer.evaluate(&square(50.0), 0.0);
    assert_abs_diff_eq!(target.score.expect("score"), 4.0, epsilon = 1e-6);
}

fn render_target(intrinsics: &CameraIntrinsics, pose: &CameraPose, dims: &TargetDimensions) -> RgbImage {
    let [tl, tr, bl, br] = dims
        .object_points()
        .map(|p| project_point(&p, pose, intrinsics).expect("visible"));
    let outline = [tl, tr, br, bl];

    let mut image = RgbImage::filled(640, 480, [15, 20, 25]);
    for y in 0..480 {
        for x in 0..640 {
            let p = Point2::new(x as f64, y as f64);
            let inside = (0..4).all(|i| {
                let a = outline[i];
                let b = outline[(i + 1) % 4];
                (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x) >= 0.0
            });
            if inside {
                image.put_pixel(x, y, [30, 240, 60]);
            }
        }
    }
    image
}

#[test]
fn detects_rendered_target() {
    let intrinsics = CameraIntrinsics {
        distortion: [0.0; 5],
        ..CameraIntrinsics::default()
    };
    let dims = TargetDimensions::default();
    let truth = CameraPose {
        rotation: Vector3::zeros(),
        translation: Vector3::new(0.0, 0.0, 10.0),
    };
    let image = render_target(&intrinsics, &truth, &dims);

    let mut params = DetectorParams::default();
    params.extraction.blur_size = 2;
    params.target.intrinsics = intrinsics;
    params.target.mount = MountGeometry::zero();

    let detector = TargetDetector::new(NalgebraGeometry::new(), params);
    let detection = detector.detect(&image, 0.0);

    assert_eq!(detection.targets.len(), 1);
    let best = detection.best_target().expect("valid target");
    assert!(best.valid, "failed: {:?}", best.failed_validator);
    assert_abs_diff_eq!(best.distance().expect("distance"), 10.0, epsilon = 0.5);
    assert_abs_diff_eq!(best.x_goal_angle().expect("angle"), 0.0, epsilon = 0.01);
}

#[test]
fn refined_corners_drive_shape_and_pose() {
    let geometry = Arc::new(CountingGeometry {
        refine_grow: 0.25,
        ..CountingGeometry::default()
    });
    let scorer = TargetScorer::new(Arc::clone(&geometry), unit_distance_params());
    let gray = GrayImage::new(4, 4);

    let coarse = scorer.evaluate(&square(50.0), 0.0);
    assert_eq!(geometry.refine_calls.load(Ordering::SeqCst), 0);
    assert_abs_diff_eq!(coarse.distance().expect("distance"), 1.0, epsilon = 1e-6);

    let refined = scorer.evaluate_in(Some(&gray), &square(50.0), 0.0);
    assert_eq!(geometry.refine_calls.load(Ordering::SeqCst), 1);
    assert!(refined.valid, "failed: {:?}", refined.failed_validator);
    let shape = refined.shape.expect("shape");
    assert_abs_diff_eq!(shape.width, 125.0, epsilon = 1e-9);
    assert_abs_diff_eq!(shape.height, 125.0, epsilon = 1e-9);
    // A 125 px image of the 100 unit target sits at 100 / 125.
    assert_abs_diff_eq!(refined.distance().expect("distance"), 0.8, epsilon = 1e-6);
    // The contour itself is not moved.
    assert_eq!(refined.contour, coarse.contour);

    let unrefined = TargetScorer::new(
        Arc::clone(&geometry),
        TargetParams {
            corner_refinement: None,
            ..unit_distance_params()
        },
    )
    .evaluate_in(Some(&gray), &square(50.0), 0.0);
    assert_eq!(geometry.refine_calls.load(Ordering::SeqCst), 1);
    assert_abs_diff_eq!(unrefined.distance().expect("distance"), 1.0, epsilon = 1e-6);
}

#[test]
fn detect_refines_each_candidate_once() {
    let intrinsics = CameraIntrinsics {
        distortion: [0.0; 5],
        ..CameraIntrinsics::default()
    };
    let dims = TargetDimensions::default();
    let truth = CameraPose {
        rotation: Vector3::zeros(),
        translation: Vector3::new(0.0, 0.0, 10.0),
    };
    let image = render_target(&intrinsics, &truth, &dims);

    let mut params = DetectorParams::default();
    params.extraction.blur_size = 2;
    params.target.intrinsics = intrinsics;
    params.target.mount = MountGeometry::zero();

    let geometry = Arc::new(CountingGeometry::default());
    let detector = TargetDetector::from_shared(Arc::clone(&geometry), params);
    let detection = detector.detect(&image, 0.0);
    assert_eq!(detection.targets.len(), 1);
    assert_eq!(geometry.refine_calls.load(Ordering::SeqCst), 1);
    let best = detection.best_target().expect("valid target");
    assert_abs_diff_eq!(best.distance().expect("distance"), 10.0, epsilon = 0.5);

    let candidates = detector.extractor().extract(&image);
    detector.detect_candidates(&candidates, 0.0);
    assert_eq!(geometry.refine_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn background_only_image_has_no_candidates() {
    let detector = TargetDetector::new(NalgebraGeometry::new(), DetectorParams::default());
    let detection = detector.detect(&RgbImage::filled(64, 48, [0, 0, 0]), 0.0);
    assert!(detection.targets.is_empty());
    assert!(detection.best.is_none());
}

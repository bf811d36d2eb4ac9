use aimtrack_core::{
    CameraIntrinsics, CameraPose, CornerRefinement, GrayImage, HsvRange, Polygon, RgbImage,
    VisionGeometry,
};
use nalgebra::{Point2, Point3};

use crate::{color, contours, filter, pnp, polygon, rect, subpix};

const DEFAULT_REFINE_ITERATIONS: usize = 20;

/// [`VisionGeometry`] implemented with the functions of this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NalgebraGeometry {
    refine_iterations: usize,
}

impl NalgebraGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of Levenberg-Marquardt iterations after the closed-form pose.
    /// Zero disables refinement.
    pub fn with_refine_iterations(mut self, iterations: usize) -> Self {
        self.refine_iterations = iterations;
        self
    }

    pub fn refine_iterations(&self) -> usize {
        self.refine_iterations
    }
}

impl Default for NalgebraGeometry {
    fn default() -> Self {
        Self {
            refine_iterations: DEFAULT_REFINE_ITERATIONS,
        }
    }
}

impl VisionGeometry for NalgebraGeometry {
    fn threshold(&self, image: &RgbImage, range: &HsvRange) -> GrayImage {
        color::threshold_hsv(image, range)
    }

    fn median_filter(&self, mask: &GrayImage, radius: usize) -> GrayImage {
        filter::median_filter(mask, radius)
    }

    fn find_contours(&self, mask: &GrayImage) -> Vec<Polygon> {
        contours::find_contours(mask)
    }

    fn convex_hull(&self, points: &[Point2<f64>]) -> Polygon {
        polygon::convex_hull(points)
    }

    fn approx_polygon(&self, polygon: &[Point2<f64>], epsilon: f64) -> Polygon {
        polygon::approx_polygon(polygon, epsilon)
    }

    fn contour_area(&self, polygon: &[Point2<f64>]) -> f64 {
        polygon::polygon_area(polygon)
    }

    fn min_area_rect(&self, points: &[Point2<f64>]) -> Option<[Point2<f64>; 4]> {
        rect::min_area_rect(points)
    }

    fn solve_pnp(
        &self,
        object_points: &[Point3<f64>; 4],
        image_points: &[Point2<f64>; 4],
        intrinsics: &CameraIntrinsics,
    ) -> Option<CameraPose> {
        pnp::solve_planar_pose(object_points, image_points, intrinsics, self.refine_iterations)
    }

    fn refine_corners(
        &self,
        image: &GrayImage,
        corners: [Point2<f64>; 4],
        params: &CornerRefinement,
    ) -> [Point2<f64>; 4] {
        subpix::refine_corners(image, corners, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_to_hull_through_the_trait() {
        let geometry: &dyn VisionGeometry = &NalgebraGeometry::new();

        let mut image = RgbImage::filled(40, 30, [0, 0, 0]);
        for y in 5..20 {
            for x in 8..30 {
                image.put_pixel(x, y, [20, 240, 30]);
            }
        }
        let mask = geometry.threshold(&image, &HsvRange::default());
        assert_eq!(mask.count_nonzero(), 22 * 15);
        // The median filter rounds rectangle corners; only check it keeps the blob.
        assert!(geometry.median_filter(&mask, 2).count_nonzero() > 22 * 15 - 16);

        let contours = geometry.find_contours(&mask);
        assert_eq!(contours.len(), 1);

        let hull = geometry.convex_hull(&contours[0]);
        let simple = geometry.approx_polygon(&hull, 2.0);
        assert_eq!(simple.len(), 4);
        // Pixel-centre outline of a 22x15 block.
        assert_eq!(geometry.contour_area(&simple), 21.0 * 14.0);
        assert!(geometry.min_area_rect(&simple).is_some());
    }
}

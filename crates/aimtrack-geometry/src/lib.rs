//! Reference [`VisionGeometry`](aimtrack_core::VisionGeometry) backend.
//!
//! Everything here is plain Rust on top of `nalgebra`: color thresholding,
//! binary median filtering, Moore-neighbour contour tracing, convex hulls,
//! Douglas-Peucker simplification, rotating-calipers rectangles, sub-pixel
//! corner refinement and a planar PnP solver (homography decomposition plus
//! Levenberg-Marquardt refinement).
//!
//! The free functions are public so detection code and tests can use them
//! directly; [`NalgebraGeometry`] bundles them behind the trait.

mod backend;
mod color;
mod contours;
mod distortion;
mod filter;
mod homography;
mod pnp;
mod polygon;
mod rect;
mod subpix;

pub use backend::NalgebraGeometry;
pub use color::{rgb_to_hsv, threshold_hsv};
pub use contours::find_contours;
pub use distortion::{distort_normalized, project_point, undistort_point};
pub use filter::median_filter;
pub use homography::{homography_from_4pt, Homography};
pub use pnp::{refine_pose, solve_planar_pose};
pub use polygon::{approx_polygon, convex_hull, polygon_area};
pub use rect::min_area_rect;
pub use subpix::{refine_corner, refine_corners};

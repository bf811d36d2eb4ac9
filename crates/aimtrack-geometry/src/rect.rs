use nalgebra::{Point2, Vector2};

use crate::polygon::convex_hull;

/// Minimum-area enclosing rectangle by rotating calipers over the hull edges.
///
/// Corners are returned in boundary order. `None` when fewer than three
/// non-collinear finite points are given.
pub fn min_area_rect(points: &[Point2<f64>]) -> Option<[Point2<f64>; 4]> {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return None;
    }

    let mut best: Option<(f64, [Point2<f64>; 4])> = None;
    for (i, &a) in hull.iter().enumerate() {
        let b = hull[(i + 1) % hull.len()];
        let edge = b - a;
        let len = edge.norm();
        if len <= f64::EPSILON {
            continue;
        }
        let u = edge / len;
        let v = Vector2::new(-u.y, u.x);

        let (mut u_min, mut u_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut v_min, mut v_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &hull {
            let d = p - a;
            let (pu, pv) = (d.dot(&u), d.dot(&v));
            u_min = u_min.min(pu);
            u_max = u_max.max(pu);
            v_min = v_min.min(pv);
            v_max = v_max.max(pv);
        }

        let area = (u_max - u_min) * (v_max - v_min);
        if best.as_ref().is_none_or(|(best_area, _)| area < *best_area) {
            best = Some((
                area,
                [
                    a + u * u_min + v * v_min,
                    a + u * u_max + v * v_min,
                    a + u * u_max + v * v_max,
                    a + u * u_min + v * v_max,
                ],
            ));
        }
    }

    best.map(|(_, corners)| corners)
}

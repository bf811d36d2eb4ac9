use aimtrack_core::Polygon;
use nalgebra::Point2;

/// Absolute area enclosed by a closed polygon (shoelace formula).
pub fn polygon_area(polygon: &[Point2<f64>]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        twice += a.x * b.y - b.x * a.y;
    }
    0.5 * twice.abs()
}

#[inline]
fn cross(o: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by Andrew's monotone chain.
///
/// Non-finite points are dropped, collinear points on hull edges are not
/// reported. Fewer than three distinct points come back sorted.
pub fn convex_hull(points: &[Point2<f64>]) -> Polygon {
    let mut pts: Vec<Point2<f64>> = points
        .iter()
        .copied()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point2<f64>> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point2<f64>> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn segment_distance(p: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f64::EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Douglas-Peucker simplification of a closed polygon.
///
/// The ring is split at the vertex farthest from the first one and each half
/// is simplified independently, so the result does not depend on where a
/// straight run happens to start. Vertices closer than `epsilon` to the
/// simplified outline are dropped.
pub fn approx_polygon(polygon: &[Point2<f64>], epsilon: f64) -> Polygon {
    let n = polygon.len();
    if n < 3 || !(epsilon > 0.0) {
        return polygon.to_vec();
    }

    let origin = polygon[0];
    let far = (1..n)
        .max_by(|&a, &b| {
            (polygon[a] - origin)
                .norm_squared()
                .total_cmp(&(polygon[b] - origin).norm_squared())
        })
        .unwrap_or(1);

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[far] = true;

    // Index `n` stands for vertex 0 closing the ring.
    let mut spans = vec![(0usize, far), (far, n)];
    while let Some((first, last)) = spans.pop() {
        if last <= first + 1 {
            continue;
        }
        let a = polygon[first % n];
        let b = polygon[last % n];
        let mut best = (first, -1.0);
        for i in first + 1..last {
            let d = segment_distance(polygon[i], a, b);
            if d > best.1 {
                best = (i, d);
            }
        }
        if best.1 > epsilon {
            keep[best.0] = true;
            spans.push((first, best.0));
            spans.push((best.0, last));
        }
    }

    polygon
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

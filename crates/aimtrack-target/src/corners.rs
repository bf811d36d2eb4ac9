use nalgebra::Point2;
use serde::Serialize;

/// The four labeled image corners of a target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TargetCorners {
    pub top_left: Point2<f64>,
    pub top_right: Point2<f64>,
    pub bottom_left: Point2<f64>,
    pub bottom_right: Point2<f64>,
}

impl TargetCorners {
    /// Label four points as left/right and top/bottom.
    ///
    /// Points are sorted by `(x, y)`; the first two form the left pair and the
    /// last two the right pair. Within a pair the smaller y is the top corner,
    /// an exact tie keeps the sorted order. Returns `None` if a point is not
    /// finite or two points coincide.
    pub fn label(points: [Point2<f64>; 4]) -> Option<Self> {
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return None;
        }
        let mut sorted = points;
        sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return None;
        }

        let pair = |a: Point2<f64>, b: Point2<f64>| if a.y > b.y { (b, a) } else { (a, b) };
        let (top_left, bottom_left) = pair(sorted[0], sorted[1]);
        let (top_right, bottom_right) = pair(sorted[2], sorted[3]);
        Some(Self {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
        })
    }

    /// Corners in the order matching
    /// [`TargetDimensions::object_points`](crate::TargetDimensions::object_points).
    pub fn to_array(&self) -> [Point2<f64>; 4] {
        [self.top_left, self.top_right, self.bottom_left, self.bottom_right]
    }

    /// Corners walking around the quadrilateral.
    pub fn outline(&self) -> [Point2<f64>; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Area centroid of the quadrilateral, or the mean of the corners if it
    /// has no area.
    pub fn centroid(&self) -> Point2<f64> {
        let outline = self.outline();
        let (mut a2, mut cx, mut cy) = (0.0, 0.0, 0.0);
        for (i, p) in outline.iter().enumerate() {
            let q = outline[(i + 1) % 4];
            let cross = p.x * q.y - q.x * p.y;
            a2 += cross;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }
        if a2.abs() <= f64::EPSILON {
            let sum = outline.iter().fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
            return Point2::from(sum / 4.0);
        }
        Point2::new(cx / (3.0 * a2), cy / (3.0 * a2))
    }
}

/// Replace each rectangle corner by the nearest polygon vertex.
///
/// Ties keep the earlier vertex. `None` for an empty polygon.
pub fn snap_to_vertices(rect: [Point2<f64>; 4], polygon: &[Point2<f64>]) -> Option<[Point2<f64>; 4]> {
    if polygon.is_empty() {
        return None;
    }
    let mut out = rect;
    for corner in out.iter_mut() {
        let mut best = (f64::INFINITY, polygon[0]);
        for &v in polygon {
            let d = (v - *corner).norm_squared();
            if d < best.0 {
                best = (d, v);
            }
        }
        *corner = best.1;
    }
    Some(out)
}

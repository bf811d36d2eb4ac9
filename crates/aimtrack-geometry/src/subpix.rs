use aimtrack_core::{CornerRefinement, GrayImage};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Refine every corner with [`refine_corner`].
#[cfg_attr(feature = "tracing", instrument(level = "trace", skip(image)))]
pub fn refine_corners(
    image: &GrayImage,
    corners: [Point2<f64>; 4],
    params: &CornerRefinement,
) -> [Point2<f64>; 4] {
    corners.map(|c| refine_corner(image, c, params))
}

/// Gradient-orthogonality corner refinement.
///
/// At the true corner `q`, every image gradient `g(p)` inside the window is
/// orthogonal to `p - q`: flat pixels have no gradient and edge pixels lie on
/// a line through `q`. Each iteration solves the Gaussian-weighted least
/// squares system `sum(g g^T) q = sum(g g^T p)` around the current estimate.
///
/// Returns `start` unchanged when the window holds no usable structure or the
/// estimate leaves the search window.
pub fn refine_corner(image: &GrayImage, start: Point2<f64>, params: &CornerRefinement) -> Point2<f64> {
    let [hx, hy] = params.half_window;
    if image.width == 0 || image.height == 0 || hx == 0 || hy == 0 {
        return start;
    }
    if !(start.x.is_finite() && start.y.is_finite()) {
        return start;
    }

    let (hx, hy) = (hx as i64, hy as i64);
    let weights_x: Vec<f64> = (-hx..=hx).map(|d| gaussian(d, hx)).collect();
    let weights_y: Vec<f64> = (-hy..=hy).map(|d| gaussian(d, hy)).collect();
    let eps2 = params.epsilon * params.epsilon;

    let mut current = start;
    for _ in 0..params.max_iterations {
        let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
        let (mut bx, mut by) = (0.0, 0.0);
        for (wy, dy) in weights_y.iter().zip(-hy..=hy) {
            let y = current.y + dy as f64;
            for (wx, dx) in weights_x.iter().zip(-hx..=hx) {
                let x = current.x + dx as f64;
                let gx = 0.5 * (bilinear(image, x + 1.0, y) - bilinear(image, x - 1.0, y));
                let gy = 0.5 * (bilinear(image, x, y + 1.0) - bilinear(image, x, y - 1.0));
                let w = wx * wy;
                let (gxx, gxy, gyy) = (gx * gx * w, gx * gy * w, gy * gy * w);
                a += gxx;
                b += gxy;
                c += gyy;
                bx += gxx * dx as f64 + gxy * dy as f64;
                by += gxy * dx as f64 + gyy * dy as f64;
            }
        }

        let det = a * c - b * b;
        if !(det.abs() > f64::EPSILON) {
            break;
        }
        let step_x = (c * bx - b * by) / det;
        let step_y = (a * by - b * bx) / det;
        current = Point2::new(current.x + step_x, current.y + step_y);
        if step_x * step_x + step_y * step_y <= eps2 {
            break;
        }
    }

    let drift = current - start;
    if !(drift.x.abs() <= hx as f64 && drift.y.abs() <= hy as f64) {
        return start;
    }
    current
}

#[inline]
fn gaussian(d: i64, half: i64) -> f64 {
    let t = d as f64 / half as f64;
    (-t * t).exp()
}

/// Bilinear sample with the border replicated.
fn bilinear(image: &GrayImage, x: f64, y: f64) -> f64 {
    let x = x.clamp(0.0, (image.width - 1) as f64);
    let y = y.clamp(0.0, (image.height - 1) as f64);
    let (x0, y0) = (x.floor() as usize, y.floor() as usize);
    let x1 = (x0 + 1).min(image.width - 1);
    let y1 = (y0 + 1).min(image.height - 1);
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);
    let at = |px: usize, py: usize| f64::from(image.data[py * image.width + px]);
    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn bright_block(w: usize, h: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        for y in y0..y1 {
            for x in x0..x1 {
                img.set(x, y, 255);
            }
        }
        img
    }

    #[test]
    fn converges_on_step_corner() {
        // The intensity corner sits between pixels 19 and 20 on both axes.
        let img = bright_block(40, 40, 20, 20, 40, 40);
        let params = CornerRefinement::default();
        for start in [Point2::new(22.0, 23.0), Point2::new(18.0, 17.5)] {
            let refined = refine_corner(&img, start, &params);
            assert_abs_diff_eq!(refined.x, 19.5, epsilon = 0.25);
            assert_abs_diff_eq!(refined.y, 19.5, epsilon = 0.25);
        }
    }

    #[test]
    fn rectangle_corners_move_to_the_edges() {
        let img = bright_block(40, 32, 10, 8, 30, 24);
        let coarse = [
            Point2::new(11.0, 9.0),
            Point2::new(28.0, 6.5),
            Point2::new(31.0, 22.0),
            Point2::new(8.5, 25.0),
        ];
        let expected = [(9.5, 7.5), (29.5, 7.5), (29.5, 23.5), (9.5, 23.5)];
        let refined = refine_corners(&img, coarse, &CornerRefinement::default());
        for (p, (x, y)) in refined.iter().zip(expected) {
            assert_abs_diff_eq!(p.x, x, epsilon = 0.25);
            assert_abs_diff_eq!(p.y, y, epsilon = 0.25);
        }
    }

    #[test]
    fn flat_window_keeps_the_start() {
        let img = GrayImage::new(20, 20);
        let start = Point2::new(5.0, 5.0);
        assert_eq!(refine_corner(&img, start, &CornerRefinement::default()), start);

        let nan = Point2::new(f64::NAN, 1.0);
        assert!(refine_corner(&img, nan, &CornerRefinement::default()).x.is_nan());
        assert_eq!(refine_corner(&GrayImage::new(0, 0), start, &CornerRefinement::default()), start);
    }
}

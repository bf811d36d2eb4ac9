use aimtrack_core::{GrayImage, Polygon};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Moore neighbourhood, clockwise in image coordinates (y down), starting east.
const DIRS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const WEST: usize = 4;

fn dir_index(dx: i64, dy: i64) -> usize {
    DIRS.iter().position(|&d| d == (dx, dy)).unwrap_or(WEST)
}

/// Outer boundary of every 8-connected foreground component.
///
/// Components are reported in raster order of their top-left pixel. Each
/// contour lists pixel centres clockwise (in image coordinates); holes are
/// ignored.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(w = mask.width, h = mask.height))
)]
pub fn find_contours(mask: &GrayImage) -> Vec<Polygon> {
    let (w, h) = (mask.width, mask.height);
    let mut visited = vec![false; w * h];
    let mut stack = Vec::new();
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if mask.data[i] == 0 || visited[i] {
                continue;
            }

            // Label the whole component first so it is traced exactly once.
            visited[i] = true;
            stack.push((x as i64, y as i64));
            let mut size = 0usize;
            while let Some((cx, cy)) = stack.pop() {
                size += 1;
                for (dx, dy) in DIRS {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if mask.get(nx, ny) == 0 {
                        continue;
                    }
                    let j = ny as usize * w + nx as usize;
                    if !visited[j] {
                        visited[j] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            contours.push(trace_boundary(mask, (x as i64, y as i64), size));
        }
    }

    log::trace!("found {} contours", contours.len());
    contours
}

/// Moore-neighbour tracing from the component's first raster pixel.
///
/// Stops when the start pixel is about to be left in the same direction as the
/// first step, which also handles one-pixel-wide bridges through the start.
fn trace_boundary(mask: &GrayImage, start: (i64, i64), size: usize) -> Polygon {
    let mut contour = vec![Point2::new(start.0 as f64, start.1 as f64)];
    let mut p = start;
    // Raster order guarantees the west neighbour is background.
    let mut back = WEST;
    let mut first_step = None;

    for _ in 0..4 * size + 8 {
        let Some(d) = (1..8)
            .map(|k| (back + k) % 8)
            .find(|&d| mask.get(p.0 + DIRS[d].0, p.1 + DIRS[d].1) != 0)
        else {
            // Isolated pixel.
            break;
        };

        if p == start {
            match first_step {
                None => first_step = Some(d),
                Some(f) if f == d => break,
                Some(_) => {}
            }
        }

        let prev = DIRS[(d + 7) % 8];
        let b = (p.0 + prev.0, p.1 + prev.1);
        p = (p.0 + DIRS[d].0, p.1 + DIRS[d].1);
        back = dir_index(b.0 - p.0, b.1 - p.1);

        if p != start {
            contour.push(Point2::new(p.0 as f64, p.1 as f64));
        }
    }

    contour
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon_area;

    fn mask_from(rows: &[&str]) -> GrayImage {
        let h = rows.len();
        let w = rows[0].len();
        let mut img = GrayImage::new(w, h);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.bytes().enumerate() {
                if c == b'#' {
                    img.set(x, y, 255);
                }
            }
        }
        img
    }

    #[test]
    fn traces_square_boundary() {
        let mask = mask_from(&[
            ".......", //
            ".......",
            "..###..",
            "..###..",
            "..###..",
            ".......",
        ]);
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.len(), 8);
        assert_eq!(c[0], Point2::new(2.0, 2.0));
        assert_eq!(c[1], Point2::new(3.0, 2.0));
        assert_eq!(polygon_area(c), 4.0);
    }

    #[test]
    fn separate_blobs_and_single_pixels() {
        let mask = mask_from(&[
            "##......", //
            "##....#.",
            "........",
            "...#....",
        ]);
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 3);
        assert_eq!(contours[0].len(), 4);
        assert_eq!(contours[1], vec![Point2::new(6.0, 1.0)]);
        assert_eq!(contours[2], vec![Point2::new(3.0, 3.0)]);
    }

    #[test]
    fn diagonal_neighbours_are_connected_and_holes_ignored() {
        let mask = mask_from(&[
            "#####.", //
            "#...#.",
            "#####.",
            ".....#",
        ]);
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert!(c.contains(&Point2::new(5.0, 3.0)));
        assert!(!c.contains(&Point2::new(2.0, 1.0)));
    }

    #[test]
    fn empty_mask_has_no_contours() {
        assert!(find_contours(&GrayImage::new(5, 5)).is_empty());
        assert!(find_contours(&GrayImage::new(0, 0)).is_empty());
    }
}

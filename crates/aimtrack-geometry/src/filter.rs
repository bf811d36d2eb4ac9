use aimtrack_core::GrayImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Median filter of a binary mask over a `(2 * radius + 1)` square window.
///
/// Non-zero input pixels count as foreground. Borders replicate the edge
/// pixels. For a binary image the median is a majority vote, evaluated in
/// constant time per pixel from an integral image.
///
/// A window larger than the image only sees replicated border pixels, so the
/// radius is clamped to the larger image dimension.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(mask)))]
pub fn median_filter(mask: &GrayImage, radius: usize) -> GrayImage {
    let (w, h) = (mask.width, mask.height);
    if radius == 0 || w == 0 || h == 0 {
        return mask.clone();
    }

    let radius = radius.min(w.max(h));
    let r = radius as i64;
    let pw = w.saturating_add(radius.saturating_mul(2));
    let ph = h.saturating_add(radius.saturating_mul(2));
    let stride = pw + 1;
    let mut integral = vec![0u32; stride.saturating_mul(ph + 1)];
    for py in 0..ph {
        let sy = (py as i64 - r).clamp(0, h as i64 - 1) as usize;
        let mut row = 0u32;
        for px in 0..pw {
            let sx = (px as i64 - r).clamp(0, w as i64 - 1) as usize;
            row += u32::from(mask.data[sy * w + sx] != 0);
            integral[(py + 1) * stride + px + 1] = integral[py * stride + px + 1] + row;
        }
    }

    let k = 2 * radius + 1;
    let half = u32::try_from(k.saturating_mul(k) / 2).unwrap_or(u32::MAX);
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let (x1, y1) = (x + k, y + k);
            let count = integral[y1 * stride + x1] + integral[y * stride + x]
                - integral[y * stride + x1]
                - integral[y1 * stride + x];
            if count > half {
                out.data[y * w + x] = 255;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(w: usize, h: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        for y in y0..y1 {
            for x in x0..x1 {
                img.set(x, y, 255);
            }
        }
        img
    }

    #[test]
    fn huge_radius_is_clamped_to_the_image() {
        let img = block(5, 4, 0, 0, 3, 4);
        let clamped = median_filter(&img, 5);
        assert_eq!(median_filter(&img, usize::MAX), clamped);
        assert_eq!(median_filter(&img, 1_000_000), clamped);
        assert_eq!(median_filter(&GrayImage::new(4, 4), usize::MAX).count_nonzero(), 0);
    }

    #[test]
    fn removes_isolated_specks() {
        let mut img = block(20, 20, 5, 5, 15, 15);
        img.set(1, 18, 255);
        let out = median_filter(&img, 1);
        assert_eq!(out.get(1, 18), 0);
        assert_eq!(out.get(10, 10), 255);
    }

    #[test]
    fn fills_pinholes() {
        let mut img = block(20, 20, 2, 2, 18, 18);
        img.set(9, 9, 0);
        let out = median_filter(&img, 2);
        assert_eq!(out.get(9, 9), 255);
    }

    #[test]
    fn replicated_border_keeps_full_mask() {
        let img = block(6, 4, 0, 0, 6, 4);
        assert_eq!(median_filter(&img, 3).count_nonzero(), 24);
    }

    #[test]
    fn radius_zero_is_identity() {
        let mut img = GrayImage::new(3, 3);
        img.set(1, 1, 7);
        assert_eq!(median_filter(&img, 0), img);
    }
}

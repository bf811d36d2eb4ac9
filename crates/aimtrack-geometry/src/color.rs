use aimtrack_core::{GrayImage, HsvRange, RgbImage};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// 8-bit RGB to HSV using the OpenCV convention: H in `0..=180` (half
/// degrees), S and V in `0..=255`.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [(h / 2.0).round() as u8, s.round() as u8, v as u8]
}

/// Binary mask of the pixels whose HSV value lies inside `range`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(w = image.width, h = image.height))
)]
pub fn threshold_hsv(image: &RgbImage, range: &HsvRange) -> GrayImage {
    let mut mask = GrayImage::new(image.width, image.height);
    for (dst, px) in mask.data.iter_mut().zip(image.data.chunks_exact(3)) {
        if range.contains(rgb_to_hsv([px[0], px[1], px[2]])) {
            *dst = 255;
        }
    }
    mask
}

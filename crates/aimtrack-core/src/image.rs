/// Single-channel 8-bit image, row-major, `data.len() == width * height`.
///
/// Thresholded masks use `0` for background and `255` for foreground.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0;
        }
        self.data[y as usize * self.width + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }

    /// Luma of `image` with BT.601 weights, rounded.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .data
            .chunks_exact(3)
            .map(|px| {
                let [r, g, b] = [px[0], px[1], px[2]].map(u32::from);
                ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
            })
            .collect();
        Self {
            width: image.width,
            height: image.height,
            data,
        }
    }

    /// Number of non-zero pixels.
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Interleaved 8-bit RGB image, row-major, `data.len() == 3 * width * height`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; 3 * width * height],
        }
    }

    /// Wrap an existing buffer. Returns `None` if the length does not match.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == 3 * width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Image filled with a single color.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(3 * width * height);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = 3 * (y * self.width + x);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = 3 * (y * self.width + x);
        self.data[i..i + 3].copy_from_slice(&rgb);
    }
}

/// One camera image plus the monotonic time it was captured at.
///
/// A frame is moved from the acquisition side into the frame slot and from
/// there into the consumer; it is never shared between the two.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    /// Capture time in seconds on the pipeline clock.
    pub timestamp: f64,
    /// Per-device frame number, starting at 0 for the first delivered frame.
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp: f64, sequence: u64) -> Self {
        Self {
            image,
            timestamp,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_get_is_zero_outside() {
        let mut img = GrayImage::new(3, 2);
        img.set(2, 1, 9);
        assert_eq!(img.get(2, 1), 9);
        assert_eq!(img.get(-1, 0), 0);
        assert_eq!(img.get(3, 0), 0);
        assert_eq!(img.count_nonzero(), 1);
    }

    #[test]
    fn gray_from_rgb_uses_luma_weights() {
        let mut img = RgbImage::filled(2, 1, [255, 255, 255]);
        img.put_pixel(1, 0, [20, 240, 30]);
        let gray = GrayImage::from_rgb(&img);
        assert_eq!((gray.width, gray.height), (2, 1));
        assert_eq!(gray.data, vec![255, 150]);
    }

    #[test]
    fn rgb_from_raw_checks_length() {
        assert!(RgbImage::from_raw(2, 2, vec![0; 12]).is_some());
        assert!(RgbImage::from_raw(2, 2, vec![0; 11]).is_none());

        let mut img = RgbImage::filled(2, 2, [1, 2, 3]);
        img.put_pixel(1, 1, [7, 8, 9]);
        assert_eq!(img.pixel(0, 0), [1, 2, 3]);
        assert_eq!(img.pixel(1, 1), [7, 8, 9]);
    }
}

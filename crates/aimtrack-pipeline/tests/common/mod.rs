#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use aimtrack_core::{CameraIntrinsics, CameraPose, RgbImage};
use aimtrack_geometry::project_point;
use aimtrack_pipeline::{CaptureDevice, CaptureError};
use aimtrack_target::{DetectorParams, MountGeometry, TargetDimensions};
use nalgebra::{Point2, Vector3};

pub const BACKGROUND: [u8; 3] = [15, 20, 25];

/// Default calibration without lens distortion.
pub fn camera() -> CameraIntrinsics {
    CameraIntrinsics {
        distortion: [0.0; 5],
        ..CameraIntrinsics::default()
    }
}

pub fn detector_params() -> DetectorParams {
    let mut params = DetectorParams::default();
    params.extraction.blur_size = 2;
    params.target.intrinsics = camera();
    params.target.mount = MountGeometry::zero();
    params
}

/// Filled target quad seen from `pose` on a dark background.
pub fn render_target(pose: &CameraPose) -> RgbImage {
    let intrinsics = camera();
    let [tl, tr, bl, br] = TargetDimensions::default()
        .object_points()
        .map(|p| project_point(&p, pose, &intrinsics).expect("visible"));
    let outline = [tl, tr, br, bl];

    let mut image = RgbImage::filled(640, 480, BACKGROUND);
    for y in 0..480 {
        for x in 0..640 {
            let p = Point2::new(x as f64, y as f64);
            let inside = (0..4).all(|i| {
                let a = outline[i];
                let b = outline[(i + 1) % 4];
                (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x) >= 0.0
            });
            if inside {
                image.put_pixel(x, y, [30, 240, 60]);
            }
        }
    }
    image
}

/// Target straight ahead at distance 10.
pub fn centered_target() -> RgbImage {
    render_target(&CameraPose {
        rotation: Vector3::zeros(),
        translation: Vector3::new(0.0, 0.0, 10.0),
    })
}

pub fn blank() -> RgbImage {
    RgbImage::filled(640, 480, BACKGROUND)
}

/// Cycles through `frames` until `total` have been delivered.
pub struct ReplayDevice {
    frames: Vec<RgbImage>,
    total: usize,
    delivered: usize,
    interval: Duration,
    open: bool,
}

impl ReplayDevice {
    pub fn new(frames: Vec<RgbImage>, total: usize, interval: Duration) -> Self {
        Self {
            frames,
            total,
            delivered: 0,
            interval,
            open: false,
        }
    }
}

impl CaptureDevice for ReplayDevice {
    fn open(&mut self) -> Result<(), CaptureError> {
        self.open = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        if !self.open {
            return Err(CaptureError::Read("not open".into()));
        }
        if self.delivered >= self.total || self.frames.is_empty() {
            return Err(CaptureError::EndOfStream);
        }
        thread::sleep(self.interval);
        let frame = self.frames[self.delivered % self.frames.len()].clone();
        self.delivered += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.open = false;
    }
}

pub fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !done() {
        assert!(Instant::now() < deadline, "timed out after {timeout:?}");
        thread::sleep(Duration::from_millis(2));
    }
}

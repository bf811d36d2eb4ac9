//! Background camera acquisition.
//!
//! [`CameraCapture`] owns a [`CaptureDevice`] and runs a thread that keeps it
//! connected and pushes every frame into a shared [`FrameSlot`]. A device that
//! fails to open is retried after the reconnect interval; a failed read
//! releases the device and reconnects. Nothing here ever gives up on its own
//! except a device reporting [`CaptureError::EndOfStream`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use aimtrack_core::{Clock, Frame, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, WorkerError};
use crate::frame_slot::FrameSlot;
use crate::worker::Worker;

/// Longest uninterrupted sleep while waiting to reconnect.
const BACKOFF_STEP: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    #[default]
    Auto,
    /// Device-specific manual exposure value.
    Manual(f64),
}

/// Settings applied to a device every time it connects.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    /// Requested frame rate; `None` keeps the device default.
    pub fps: Option<f64>,
    pub exposure: Exposure,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: None,
            exposure: Exposure::Auto,
        }
    }
}

/// A frame source: a camera, a video file or a scripted replay.
///
/// `read_frame` blocks until the next frame is available. Setters that a
/// device does not support may keep the default no-op.
pub trait CaptureDevice: Send + 'static {
    fn open(&mut self) -> Result<(), CaptureError>;

    fn read_frame(&mut self) -> Result<RgbImage, CaptureError>;

    fn release(&mut self);

    fn set_resolution(&mut self, _width: u32, _height: u32) -> Result<(), CaptureError> {
        Ok(())
    }

    fn set_fps(&mut self, _fps: f64) -> Result<(), CaptureError> {
        Ok(())
    }

    fn set_exposure(&mut self, _exposure: Exposure) -> Result<(), CaptureError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "capture device".to_owned()
    }
}

impl<D: CaptureDevice + ?Sized> CaptureDevice for Box<D> {
    fn open(&mut self) -> Result<(), CaptureError> {
        (**self).open()
    }
    fn read_frame(&mut self) -> Result<RgbImage, CaptureError> {
        (**self).read_frame()
    }
    fn release(&mut self) {
        (**self).release()
    }
    fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        (**self).set_resolution(width, height)
    }
    fn set_fps(&mut self, fps: f64) -> Result<(), CaptureError> {
        (**self).set_fps(fps)
    }
    fn set_exposure(&mut self, exposure: Exposure) -> Result<(), CaptureError> {
        (**self).set_exposure(exposure)
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[derive(Debug, Default)]
struct CaptureStatus {
    connected: AtomicBool,
    finished: AtomicBool,
    frames: AtomicU64,
    connects: AtomicU64,
}

/// Acquisition thread feeding a latest-wins [`FrameSlot`].
pub struct CameraCapture<D: CaptureDevice> {
    worker: Worker<D>,
    slot: Arc<FrameSlot<Frame>>,
    status: Arc<CaptureStatus>,
    clock: Arc<dyn Clock>,
    settings: CaptureSettings,
    reconnect_interval: Duration,
}

impl<D: CaptureDevice> CameraCapture<D> {
    pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(2000);

    pub fn new(device: D, slot: Arc<FrameSlot<Frame>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            worker: Worker::new("camera-capture", device),
            slot,
            status: Arc::new(CaptureStatus::default()),
            clock,
            settings: CaptureSettings::default(),
            reconnect_interval: Self::DEFAULT_RECONNECT_INTERVAL,
        }
    }

    pub fn with_settings(mut self, settings: CaptureSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Change the settings; they take effect on the next (re)connect.
    pub fn set_settings(&mut self, settings: CaptureSettings) {
        self.settings = settings;
    }

    pub fn slot(&self) -> &Arc<FrameSlot<Frame>> {
        &self.slot
    }

    /// Start acquiring. Calling it while running does nothing.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.worker.is_running() {
            return Ok(());
        }
        self.status.finished.store(false, Ordering::Release);
        let ctx = AcquisitionContext {
            slot: Arc::clone(&self.slot),
            status: Arc::clone(&self.status),
            clock: Arc::clone(&self.clock),
            settings: self.settings,
            reconnect_interval: self.reconnect_interval,
        };
        self.worker
            .start(move |device, running| ctx.run(device, &running))
    }

    /// Stop acquiring and release the device. Waits for a read in progress.
    pub fn stop(&mut self) -> Result<(), WorkerError> {
        self.worker.stop(|| {})
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Whether the device is currently open and delivering frames.
    pub fn is_connected(&self) -> bool {
        self.status.connected.load(Ordering::Acquire)
    }

    /// Whether the device reported the end of its stream.
    pub fn is_finished(&self) -> bool {
        self.status.finished.load(Ordering::Acquire)
    }

    /// Frames delivered to the slot since creation.
    pub fn frames_captured(&self) -> u64 {
        self.status.frames.load(Ordering::Acquire)
    }

    /// Successful device opens since creation.
    pub fn connect_count(&self) -> u64 {
        self.status.connects.load(Ordering::Acquire)
    }

    /// Access the device while stopped.
    pub fn with_device<R>(&mut self, f: impl FnOnce(&mut D) -> R) -> Option<R> {
        self.worker.with_payload(f)
    }
}

impl<D: CaptureDevice> Drop for CameraCapture<D> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("camera capture did not stop cleanly: {e}");
        }
    }
}

struct AcquisitionContext {
    slot: Arc<FrameSlot<Frame>>,
    status: Arc<CaptureStatus>,
    clock: Arc<dyn Clock>,
    settings: CaptureSettings,
    reconnect_interval: Duration,
}

impl AcquisitionContext {
    fn run<D: CaptureDevice>(self, mut device: D, running: &AtomicBool) -> D {
        let mut sequence = self.status.frames.load(Ordering::Acquire);

        while running.load(Ordering::Acquire) {
            if !self.status.connected.load(Ordering::Acquire) {
                match device.open() {
                    Ok(()) => {
                        log::info!("connected to {}", device.describe());
                        apply_settings(&mut device, &self.settings);
                        self.status.connects.fetch_add(1, Ordering::AcqRel);
                        self.status.connected.store(true, Ordering::Release);
                    }
                    Err(e) => {
                        log::warn!("failed to connect to {}: {e}", device.describe());
                        sleep_while(running, self.reconnect_interval);
                    }
                }
                continue;
            }

            match device.read_frame() {
                Ok(image) => {
                    let timestamp = self.clock.now();
                    self.slot.submit(Frame::new(image, timestamp, sequence));
                    sequence += 1;
                    self.status.frames.fetch_add(1, Ordering::AcqRel);
                }
                Err(CaptureError::EndOfStream) => {
                    log::info!("{} reached end of stream", device.describe());
                    self.status.finished.store(true, Ordering::Release);
                    break;
                }
                Err(e) => {
                    log::warn!("lost {}: {e}", device.describe());
                    device.release();
                    self.status.connected.store(false, Ordering::Release);
                }
            }
        }

        device.release();
        self.status.connected.store(false, Ordering::Release);
        device
    }
}

/// Failed settings are logged and skipped; the stream keeps the device value.
fn apply_settings<D: CaptureDevice>(device: &mut D, settings: &CaptureSettings) {
    if let Err(e) = device.set_resolution(settings.width, settings.height) {
        log::warn!("{e}");
    }
    if let Some(fps) = settings.fps {
        if let Err(e) = device.set_fps(fps) {
            log::warn!("{e}");
        }
    }
    if let Err(e) = device.set_exposure(settings.exposure) {
        log::warn!("{e}");
    }
}

/// Sleep for `duration` in short steps so a stop request is noticed quickly.
fn sleep_while(running: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(BACKOFF_STEP));
    }
}

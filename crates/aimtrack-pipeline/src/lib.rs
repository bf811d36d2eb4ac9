//! Real-time plumbing around the target detector.
//!
//! A [`CameraCapture`] thread keeps a [`CaptureDevice`] connected and drops
//! every frame into a latest-wins [`FrameSlot`]. A [`TargetingLoop`] thread
//! takes the newest frame, runs it through a [`TargetProcessor`] and publishes
//! an [`AimingUpdate`] to a [`ResultsSink`]. The two threads never wait on
//! each other: a slow consumer only ever skips frames.
//!
//! ```no_run
//! use std::sync::Arc;
//! use aimtrack_core::{MonotonicClock, SharedAngle};
//! use aimtrack_pipeline::{FrameSlot, ResultsStore, TargetProcessor, TargetingLoop, TrackerConfig};
//! # fn run<G: aimtrack_core::VisionGeometry + 'static>(geometry: G) -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrackerConfig::default();
//! let clock = Arc::new(MonotonicClock::new());
//! let store = ResultsStore::with_timeout(clock.clone(), config.staleness_timeout());
//! let processor = TargetProcessor::new(
//!     config.build_detector(Arc::new(geometry)),
//!     config.heading_buffer(),
//!     SharedAngle::default(),
//!     store.clone(),
//!     clock,
//! );
//! let mut targeting = TargetingLoop::new(processor, Arc::new(FrameSlot::new()));
//! targeting.start()?;
//! # Ok(()) }
//! ```

mod capture;
mod config;
mod error;
mod fps;
mod frame_slot;
mod processor;
mod results;
mod targeting;
mod worker;

pub use capture::{CameraCapture, CaptureDevice, CaptureSettings, Exposure};
pub use config::{PipelineParams, TrackerConfig};
pub use error::{CaptureError, ConfigError, WorkerError};
pub use fps::FramerateCounter;
pub use frame_slot::{FrameSlot, SlotStats};
pub use processor::{FrameReport, TargetProcessor};
pub use results::{
    AimingResult, AimingUpdate, FanoutSink, FnSink, JsonLinesSink, LogSink, ResultsSink,
    ResultsSnapshot, ResultsStore,
};
pub use targeting::TargetingLoop;
pub use worker::Worker;

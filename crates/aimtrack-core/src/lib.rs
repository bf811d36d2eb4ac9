//! Core types for the aimtrack targeting pipeline.
//!
//! This crate holds the value types shared by every stage (frames, images,
//! poses), the orientation history used for latency compensation, and the
//! [`VisionGeometry`] contract the detection stages consume. It does *not*
//! implement any image-geometry primitive itself; see `aimtrack-geometry` for
//! the reference backend.

mod clock;
mod geometry;
mod history;
mod image;
mod logger;
mod shared;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use geometry::{
    CameraIntrinsics, CameraPose, CornerRefinement, HsvRange, Polygon, VisionGeometry,
};
pub use history::{OrientationSample, SharedTimeSeries, TimeSeriesBuffer};
pub use image::{Frame, GrayImage, RgbImage};
pub use shared::SharedAngle;

#[cfg(feature = "tracing")]
pub use logger::{init_tracing, init_tracing_with_level};

pub use logger::init_with_level;

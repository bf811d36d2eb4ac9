//! High-level facade for the `aimtrack-*` workspace.
//!
//! This crate provides:
//! - re-exports of the core types, the pure-Rust geometry backend, the target
//!   detector and the real-time pipeline,
//! - (feature `image`) helpers that load image files into frames and a
//!   [`replay::ImageSequenceDevice`] that plays a directory of images through
//!   the capture pipeline.
//!
//! ## Quickstart
//!
//! ```no_run
//! use aimtrack::detect;
//! use aimtrack::pipeline::TrackerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrackerConfig::default();
//! let detection = detect::detect_file("frame.png", &config, 0.0)?;
//! match detection.best_target().and_then(|t| t.distance()) {
//!     Some(d) => println!("goal at {d:.2}"),
//!     None => println!("no target"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `aimtrack::core`: images, frames, clocks, orientation history, geometry contract.
//! - `aimtrack::geometry`: `NalgebraGeometry`, the bundled geometry backend.
//! - `aimtrack::target`: candidate extraction, validation, scoring and selection.
//! - `aimtrack::pipeline`: frame slot, capture and targeting threads, result sinks, config.
//! - `aimtrack::detect`, `aimtrack::replay` (feature `image`): file-based helpers.

pub use aimtrack_core as core;
pub use aimtrack_geometry as geometry;
pub use aimtrack_pipeline as pipeline;
pub use aimtrack_target as target;

pub use aimtrack_core::{Frame, RgbImage, SharedAngle, SharedTimeSeries, VisionGeometry};
pub use aimtrack_geometry::NalgebraGeometry;
pub use aimtrack_pipeline::{AimingResult, AimingUpdate, TrackerConfig};
pub use aimtrack_target::{Detection, Target, TargetDetector};

#[cfg(feature = "image")]
pub mod detect;
#[cfg(feature = "image")]
pub mod replay;

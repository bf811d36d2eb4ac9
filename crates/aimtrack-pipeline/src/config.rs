//! Tracker configuration file.
//!
//! One JSON document holds the detector parameters, capture settings and
//! pipeline timing. Every field has a default, so a file only needs the
//! values it changes.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use aimtrack_core::{SharedTimeSeries, VisionGeometry};
use aimtrack_target::{DetectorParams, TargetDetector};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureSettings;
use crate::error::ConfigError;

/// Timing of the capture and targeting threads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub reconnect_interval_ms: u64,
    /// Results older than this are reported stale.
    pub staleness_timeout_ms: u64,
    /// Delay between exposure and the capture timestamp.
    pub camera_latency_ms: f64,
    pub heading_history_capacity: usize,
    /// Expected orientation sample rate, Hz.
    pub heading_frequency_hz: f64,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: 2000,
            staleness_timeout_ms: 500,
            camera_latency_ms: 0.0,
            heading_history_capacity: 100,
            heading_frequency_hz: 100.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub detector: DetectorParams,
    pub capture: CaptureSettings,
    pub pipeline: PipelineParams,
}

impl TrackerConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would make detection or timing meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let hsv = &self.detector.extraction.hsv;
        if (0..3).any(|c| hsv.min[c] > hsv.max[c]) {
            return invalid("detector.extraction.hsv", "min exceeds max");
        }

        let target = &self.detector.target;
        non_negative("detector.target.approx_poly_epsilon", target.approx_poly_epsilon)?;
        non_negative("detector.target.min_blob_area", target.min_blob_area)?;
        if let Some(refinement) = &target.corner_refinement {
            non_negative("detector.target.corner_refinement.epsilon", refinement.epsilon)?;
        }
        positive("detector.target.target.width", target.target.width)?;
        positive("detector.target.target.height", target.target.height)?;

        let k = target.intrinsics.camera_matrix();
        if !k.iter().all(|v| v.is_finite()) || k[(0, 0)] == 0.0 || k[(1, 1)] == 0.0 {
            return invalid(
                "detector.target.intrinsics.matrix",
                "focal lengths must be finite and non-zero",
            );
        }
        if !target.intrinsics.distortion.iter().all(|v| v.is_finite()) {
            return invalid("detector.target.intrinsics.distortion", "must be finite");
        }

        let v = &target.validation;
        if !(v.min_distance < v.max_distance) {
            return invalid(
                "detector.target.validation",
                format!(
                    "min_distance {} must be below max_distance {}",
                    v.min_distance, v.max_distance
                ),
            );
        }

        if self.capture.width == 0 || self.capture.height == 0 {
            return invalid("capture", "resolution must be non-zero");
        }
        if let Some(fps) = self.capture.fps {
            positive("capture.fps", fps)?;
        }
        let max_side = self.capture.width.max(self.capture.height) as usize;
        let blur = self.detector.extraction.blur_size;
        if blur > max_side {
            return invalid(
                "detector.extraction.blur_size",
                format!("{blur} exceeds the capture resolution ({max_side} px)"),
            );
        }

        let p = &self.pipeline;
        non_negative("pipeline.camera_latency_ms", p.camera_latency_ms)?;
        positive("pipeline.heading_frequency_hz", p.heading_frequency_hz)?;
        if p.heading_history_capacity == 0 {
            return invalid("pipeline.heading_history_capacity", "must be at least 1");
        }
        Ok(())
    }

    pub fn build_detector<G: VisionGeometry>(&self, geometry: Arc<G>) -> TargetDetector<G> {
        TargetDetector::from_shared(geometry, self.detector.clone())
    }

    /// Empty orientation history sized for this configuration.
    pub fn heading_buffer(&self) -> SharedTimeSeries {
        SharedTimeSeries::new(
            self.pipeline.heading_history_capacity,
            self.pipeline.heading_frequency_hz,
        )
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        self.capture
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.pipeline.reconnect_interval_ms)
    }

    pub fn staleness_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline.staleness_timeout_ms)
    }

    pub fn camera_latency(&self) -> Duration {
        Duration::try_from_secs_f64(self.pipeline.camera_latency_ms / 1000.0).unwrap_or_default()
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid {
        field,
        reason: reason.into(),
    })
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        invalid(field, format!("must be positive, got {value}"))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        invalid(field, format!("must be non-negative, got {value}"))
    }
}

use std::sync::Arc;
use std::time::Duration;

use aimtrack_core::{Clock, Frame, SharedAngle, SharedTimeSeries, VisionGeometry};
use aimtrack_target::{Detection, TargetDetector};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::fps::FramerateCounter;
use crate::results::{AimingResult, AimingUpdate, ResultsSink};

/// Frames between framerate log lines.
const FPS_LOG_INTERVAL: u64 = 30;

/// Everything produced for one frame.
#[derive(Clone, Debug, Serialize)]
pub struct FrameReport {
    pub detection: Detection,
    pub update: AimingUpdate,
}

/// Turns frames into robot-frame aiming updates.
///
/// The best target's camera-relative angles are combined with the robot
/// heading at the frame's capture time (from the orientation history, minus
/// the configured latency) and with the live mechanism angle.
pub struct TargetProcessor<G, S> {
    detector: TargetDetector<G>,
    heading: SharedTimeSeries,
    arm_angle: SharedAngle,
    sink: S,
    clock: Arc<dyn Clock>,
    latency: f64,
    fps: FramerateCounter,
    update_counter: u64,
    frames_processed: u64,
}

impl<G: VisionGeometry, S: ResultsSink> TargetProcessor<G, S> {
    pub fn new(
        detector: TargetDetector<G>,
        heading: SharedTimeSeries,
        arm_angle: SharedAngle,
        sink: S,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            detector,
            heading,
            arm_angle,
            sink,
            clock,
            latency: 0.0,
            fps: FramerateCounter::new(),
            update_counter: 0,
            frames_processed: 0,
        }
    }

    /// Camera latency subtracted from capture timestamps before the heading
    /// lookup.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency.as_secs_f64();
        self
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(sequence = frame.sequence))
    )]
    pub fn process(&mut self, frame: &Frame) -> FrameReport {
        let arm_angle = self.arm_angle.get();
        let detection = self.detector.detect(&frame.image, arm_angle);

        self.frames_processed += 1;
        let fps = self.fps.tick(self.clock.now());
        if self.frames_processed % FPS_LOG_INTERVAL == 0 {
            log::debug!("processing at {fps:.1} fps");
        }

        let result = match detection.best_target().and_then(|t| t.pose.as_ref()) {
            Some(pose) => {
                let heading = self.heading.lookup(frame.timestamp - self.latency);
                self.update_counter += 1;
                AimingResult::Target {
                    goal_heading: heading - pose.x_goal_angle,
                    goal_angle: arm_angle + pose.y_goal_angle,
                    goal_distance: pose.distance,
                }
            }
            None => AimingResult::NoTarget,
        };
        log::debug!(
            "frame {}: {} candidates, {} valid",
            frame.sequence,
            detection.targets.len(),
            detection.valid_count()
        );

        let update = AimingUpdate {
            frame_sequence: frame.sequence,
            capture_timestamp: frame.timestamp,
            update_counter: self.update_counter,
            frames_processed: self.frames_processed,
            fps,
            result,
        };
        self.sink.publish(&update);
        FrameReport { detection, update }
    }

    pub fn detector(&self) -> &TargetDetector<G> {
        &self.detector
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn update_counter(&self) -> u64 {
        self.update_counter
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }
}

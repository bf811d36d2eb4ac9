use std::sync::atomic::Ordering;
use std::sync::Arc;

use aimtrack_core::{Frame, VisionGeometry};

use crate::error::WorkerError;
use crate::frame_slot::FrameSlot;
use crate::processor::TargetProcessor;
use crate::results::ResultsSink;
use crate::worker::Worker;

/// Consumer thread: takes the newest frame, processes it, repeats.
///
/// Frames that arrive while one is being processed are replaced in the slot,
/// so the loop always works on the most recent image and never falls behind.
pub struct TargetingLoop<G, S>
where
    G: VisionGeometry + 'static,
    S: ResultsSink + 'static,
{
    slot: Arc<FrameSlot<Frame>>,
    worker: Worker<TargetProcessor<G, S>>,
}

impl<G, S> TargetingLoop<G, S>
where
    G: VisionGeometry + 'static,
    S: ResultsSink + 'static,
{
    pub fn new(processor: TargetProcessor<G, S>, slot: Arc<FrameSlot<Frame>>) -> Self {
        Self {
            slot,
            worker: Worker::new("targeting", processor),
        }
    }

    pub fn slot(&self) -> &Arc<FrameSlot<Frame>> {
        &self.slot
    }

    /// Start consuming frames. Calling it while running does nothing.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.worker.is_running() {
            return Ok(());
        }
        self.slot.reopen();
        let slot = Arc::clone(&self.slot);
        self.worker.start(move |mut processor, running| {
            while running.load(Ordering::Acquire) {
                let Some(frame) = slot.take_latest() else {
                    break;
                };
                processor.process(&frame);
            }
            processor
        })
    }

    /// Stop after the frame in progress, if any. Pending frames stay in the
    /// slot.
    pub fn stop(&mut self) -> Result<(), WorkerError> {
        let slot = Arc::clone(&self.slot);
        self.worker.stop(move || slot.close())
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Access the processor while stopped.
    pub fn with_processor<R>(&mut self, f: impl FnOnce(&mut TargetProcessor<G, S>) -> R) -> Option<R> {
        self.worker.with_payload(f)
    }
}

impl<G, S> Drop for TargetingLoop<G, S>
where
    G: VisionGeometry + 'static,
    S: ResultsSink + 'static,
{
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("targeting loop did not stop cleanly: {e}");
        }
    }
}

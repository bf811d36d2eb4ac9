//! Aiming results and where they go.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use aimtrack_core::Clock;
use serde::{Deserialize, Serialize};

/// What one processed frame says about the goal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AimingResult {
    /// Robot-frame aiming solution for the best valid target.
    Target {
        /// Heading to turn to, radians.
        goal_heading: f64,
        /// Mechanism angle to aim at, radians.
        goal_angle: f64,
        goal_distance: f64,
    },
    /// No valid target; consumers must clear any previous goal.
    NoTarget,
}

impl AimingResult {
    pub fn has_target(&self) -> bool {
        matches!(self, Self::Target { .. })
    }
}

/// Published once per processed frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AimingUpdate {
    pub frame_sequence: u64,
    /// Capture time of the frame, seconds on the pipeline clock.
    pub capture_timestamp: f64,
    /// Advances only when a valid target was found.
    pub update_counter: u64,
    pub frames_processed: u64,
    pub fps: f64,
    pub result: AimingResult,
}

/// Consumer of per-frame aiming updates.
///
/// Publishing cannot fail: sinks log their own errors so a broken consumer
/// never stops the targeting loop.
pub trait ResultsSink: Send {
    fn publish(&mut self, update: &AimingUpdate);
}

/// Adapts a closure into a [`ResultsSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(&AimingUpdate) + Send> ResultsSink for FnSink<F> {
    fn publish(&mut self, update: &AimingUpdate) {
        (self.0)(update)
    }
}

impl<S: ResultsSink + ?Sized> ResultsSink for Box<S> {
    fn publish(&mut self, update: &AimingUpdate) {
        (**self).publish(update)
    }
}

/// Collects every update.
impl ResultsSink for Vec<AimingUpdate> {
    fn publish(&mut self, update: &AimingUpdate) {
        self.push(update.clone());
    }
}

/// Latest update plus how fresh it is.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultsSnapshot {
    pub update: Option<AimingUpdate>,
    /// True when no new target arrived within the staleness timeout.
    pub stale: bool,
    /// Seconds since the update counter last changed.
    pub age: Option<f64>,
}

#[derive(Debug, Default)]
struct StoreState {
    latest: Option<AimingUpdate>,
    last_counter: Option<u64>,
    changed_at: Option<f64>,
}

/// Shared latest-value store read by the robot side.
///
/// Clones share the store. Results count as stale once the update counter
/// has not advanced for longer than the timeout, so a consumer stops aiming
/// at a target the camera no longer sees.
#[derive(Clone)]
pub struct ResultsStore {
    state: Arc<Mutex<StoreState>>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl ResultsStore {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_timeout(clock, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            clock,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn latest(&self) -> Option<AimingUpdate> {
        self.lock().latest.clone()
    }

    pub fn snapshot(&self) -> ResultsSnapshot {
        let state = self.lock();
        let age = state.changed_at.map(|t| self.clock.now() - t);
        ResultsSnapshot {
            update: state.latest.clone(),
            stale: age.is_none_or(|age| age > self.timeout.as_secs_f64()),
            age,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.snapshot().stale
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ResultsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultsStore")
            .field("timeout", &self.timeout)
            .field("latest", &self.latest())
            .finish()
    }
}

impl ResultsSink for ResultsStore {
    fn publish(&mut self, update: &AimingUpdate) {
        let now = self.clock.now();
        let mut state = self.lock();
        if state.last_counter != Some(update.update_counter) {
            state.last_counter = Some(update.update_counter);
            state.changed_at = Some(now);
        }
        state.latest = Some(update.clone());
    }
}

/// Writes one JSON object per update.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
    /// Only updates with a target are written when set.
    targets_only: bool,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            targets_only: false,
        }
    }

    pub fn targets_only(mut self, yes: bool) -> Self {
        self.targets_only = yes;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, update: &AimingUpdate) -> Result<(), std::io::Error> {
        serde_json::to_writer(&mut self.writer, update)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write + Send> ResultsSink for JsonLinesSink<W> {
    fn publish(&mut self, update: &AimingUpdate) {
        if self.targets_only && !update.result.has_target() {
            return;
        }
        if let Err(e) = self.write(update) {
            log::warn!("failed to write aiming update: {e}");
        }
    }
}

/// Logs every update at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ResultsSink for LogSink {
    fn publish(&mut self, update: &AimingUpdate) {
        match update.result {
            AimingResult::Target {
                goal_heading,
                goal_angle,
                goal_distance,
            } => log::info!(
                "frame {}: heading {:.4} rad, angle {:.4} rad, distance {:.3}",
                update.frame_sequence,
                goal_heading,
                goal_angle,
                goal_distance
            ),
            AimingResult::NoTarget => log::info!("frame {}: no target", update.frame_sequence),
        }
    }
}

/// Sends every update to each inner sink in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ResultsSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ResultsSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ResultsSink for FanoutSink {
    fn publish(&mut self, update: &AimingUpdate) {
        for sink in &mut self.sinks {
            sink.publish(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aimtrack_core::ManualClock;

    fn update(counter: u64, result: AimingResult) -> AimingUpdate {
        AimingUpdate {
            frame_sequence: counter,
            capture_timestamp: 0.0,
            update_counter: counter,
            frames_processed: counter,
            fps: 30.0,
            result,
        }
    }

    const HIT: AimingResult = AimingResult::Target {
        goal_heading: 0.1,
        goal_angle: 0.2,
        goal_distance: 10.0,
    };

    #[test]
    fn empty_store_is_stale() {
        let store = ResultsStore::new(Arc::new(ManualClock::default()));
        let snapshot = store.snapshot();
        assert!(snapshot.stale);
        assert_eq!(snapshot.update, None);
        assert_eq!(snapshot.age, None);
    }

    #[test]
    fn staleness_follows_counter_changes() {
        let clock = ManualClock::new(10.0);
        let mut store = ResultsStore::new(Arc::new(clock.clone()));

        store.publish(&update(1, HIT));
        clock.advance(Duration::from_millis(400));
        assert!(!store.is_stale());

        // Same counter: does not refresh.
        store.publish(&update(1, AimingResult::NoTarget));
        clock.advance(Duration::from_millis(200));
        let snapshot = store.snapshot();
        assert!(snapshot.stale);
        assert_eq!(snapshot.update.map(|u| u.result), Some(AimingResult::NoTarget));

        store.publish(&update(2, HIT));
        assert!(!store.is_stale());
    }

    #[test]
    fn json_lines_are_tagged() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&update(1, HIT));
        sink.publish(&update(1, AimingResult::NoTarget));
        let text = String::from_utf8(sink.into_inner()).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""kind":"target""#));
        assert!(lines[1].contains(r#""kind":"no_target""#));

        let parsed: AimingUpdate = serde_json::from_str(lines[0]).expect("parse");
        assert_eq!(parsed, update(1, HIT));
    }

    #[test]
    fn targets_only_skips_misses() {
        let mut sink = JsonLinesSink::new(Vec::new()).targets_only(true);
        sink.publish(&update(1, AimingResult::NoTarget));
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::clone(&seen);
        let b = Arc::clone(&seen);
        let mut fanout = FanoutSink::new()
            .with(FnSink(move |u: &AimingUpdate| {
                a.lock().expect("a").push(("a", u.update_counter))
            }))
            .with(FnSink(move |u: &AimingUpdate| {
                b.lock().expect("b").push(("b", u.update_counter))
            }))
            .with(LogSink);
        assert_eq!(fanout.len(), 3);
        fanout.publish(&update(7, HIT));
        assert_eq!(*seen.lock().expect("seen"), vec![("a", 7), ("b", 7)]);
    }
}

//! Fixed-capacity orientation history with timestamp lookup.
//!
//! The inertial sensor reports headings faster than the camera delivers
//! frames, and a frame is processed some time after it was captured. To aim
//! with the heading the robot had *when the frame was taken*, samples are
//! logged here and read back by capture timestamp with linear interpolation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One `(timestamp, value)` entry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub timestamp: f64,
    pub value: f64,
}

/// Circular log of the most recent `capacity` samples.
///
/// Samples are expected in non-decreasing timestamp order. Duplicates and
/// slightly out-of-order samples are tolerated: lookups stay bounded and never
/// divide by a zero time step.
#[derive(Clone, Debug)]
pub struct TimeSeriesBuffer {
    samples: Vec<OrientationSample>,
    capacity: usize,
    /// Slot holding the oldest retained sample.
    start: usize,
    len: usize,
    estimated_frequency: f64,
}

impl TimeSeriesBuffer {
    /// Create an empty buffer.
    ///
    /// `estimated_frequency` is the expected sample rate in Hz and only seeds
    /// the search in [`lookup_at`](Self::lookup_at). A capacity of 0 is
    /// raised to 1.
    pub fn new(capacity: usize, estimated_frequency: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            start: 0,
            len: 0,
            estimated_frequency,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn estimated_frequency(&self) -> f64 {
        self.estimated_frequency
    }

    /// Append a sample, overwriting the oldest one once the buffer is full.
    pub fn append(&mut self, timestamp: f64, value: f64) {
        let sample = OrientationSample { timestamp, value };
        if self.len < self.capacity {
            // `start` stays 0 until the buffer wraps for the first time.
            self.samples.push(sample);
            self.len += 1;
        } else {
            self.samples[self.start] = sample;
            self.start = (self.start + 1) % self.capacity;
        }
    }

    /// Sample at `position`, where 0 is the oldest retained sample.
    #[inline]
    pub fn get(&self, position: usize) -> Option<OrientationSample> {
        (position < self.len).then(|| self.samples[(self.start + position) % self.capacity])
    }

    pub fn oldest(&self) -> Option<OrientationSample> {
        self.get(0)
    }

    pub fn newest(&self) -> Option<OrientationSample> {
        self.len.checked_sub(1).and_then(|p| self.get(p))
    }

    /// Retained samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = OrientationSample> + '_ {
        (0..self.len).filter_map(move |p| self.get(p))
    }

    /// Value at `timestamp`, taking the newest sample's time as "now".
    pub fn lookup(&self, timestamp: f64) -> f64 {
        match self.newest() {
            Some(newest) => self.lookup_at(timestamp, newest.timestamp),
            None => 0.0,
        }
    }

    /// Value at `timestamp`, seeding the search with the sample expected at
    /// `now - timestamp` seconds in the past.
    ///
    /// Returns 0 for an empty buffer, the oldest value for timestamps at or
    /// before the oldest sample and the newest value at or after the newest
    /// sample. In between, the two bracketing samples are linearly
    /// interpolated. When their spacing is not a positive finite number (a
    /// NaN or infinite timestamp got into the buffer) the newer value is
    /// returned.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn lookup_at(&self, timestamp: f64, now: f64) -> f64 {
        let (Some(oldest), Some(newest)) = (self.oldest(), self.newest()) else {
            return 0.0;
        };
        if timestamp <= oldest.timestamp {
            return oldest.value;
        }
        if timestamp >= newest.timestamp {
            return newest.value;
        }

        // Here len >= 2 and oldest < timestamp < newest.
        let last = self.len - 1;
        let guess = self.len as f64 - (now - timestamp) * self.estimated_frequency;
        let mut r = if guess.is_nan() {
            last
        } else {
            guess.clamp(0.0, last as f64) as usize
        };

        while r < last && self.sample(r).timestamp < timestamp {
            r += 1;
        }
        while r > 0 && self.sample(r).timestamp >= timestamp {
            r -= 1;
        }
        // NaN timestamps fail both comparisons and can leave `r` on the last slot.
        let r = r.min(last - 1);

        let older = self.sample(r);
        let newer = self.sample(r + 1);
        let dt = newer.timestamp - older.timestamp;
        if dt <= 0.0 || !dt.is_finite() {
            return newer.value;
        }
        older.value + (newer.value - older.value) * (timestamp - older.timestamp) / dt
    }

    #[inline]
    fn sample(&self, position: usize) -> OrientationSample {
        self.samples[(self.start + position) % self.capacity]
    }
}

/// Thread-safe handle around a [`TimeSeriesBuffer`].
///
/// The sensor callback appends and the targeting loop looks up; both take the
/// same buffer-wide lock so a lookup never sees a half-written slot. Clones
/// share the buffer.
#[derive(Clone, Debug)]
pub struct SharedTimeSeries {
    inner: Arc<Mutex<TimeSeriesBuffer>>,
}

impl SharedTimeSeries {
    pub fn new(capacity: usize, estimated_frequency: f64) -> Self {
        Self::from_buffer(TimeSeriesBuffer::new(capacity, estimated_frequency))
    }

    pub fn from_buffer(buffer: TimeSeriesBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Record one sensor sample.
    pub fn append(&self, timestamp: f64, value: f64) {
        self.lock().append(timestamp, value);
    }

    pub fn lookup(&self, timestamp: f64) -> f64 {
        self.lock().lookup(timestamp)
    }

    pub fn lookup_at(&self, timestamp: f64, now: f64) -> f64 {
        self.lock().lookup_at(timestamp, now)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current buffer contents.
    pub fn snapshot(&self) -> TimeSeriesBuffer {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, TimeSeriesBuffer> {
        // Every mutation is a single slot write, so a poisoned buffer is
        // still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

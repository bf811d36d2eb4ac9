use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// Counters of a [`FrameSlot`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SlotStats {
    pub submitted: u64,
    pub taken: u64,
    /// Items overwritten before anyone took them.
    pub dropped: u64,
}

#[derive(Debug)]
struct SlotState<T> {
    latest: Option<T>,
    closed: bool,
    stats: SlotStats,
}

/// Single-item latest-wins hand-off between one producer and consumers.
///
/// `submit` never blocks on the consumer: a newer item replaces one that has
/// not been taken yet. `take_latest` blocks until an item submitted after the
/// previous take is available and moves it out, so the consumer never sees
/// the same item twice and never a half-written one.
#[derive(Debug)]
pub struct FrameSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                latest: None,
                closed: false,
                stats: SlotStats::default(),
            }),
            ready: Condvar::new(),
        }
    }

    /// Store `item`, replacing any item not yet taken, and wake one waiter.
    pub fn submit(&self, item: T) {
        let mut state = self.lock();
        if state.latest.replace(item).is_some() {
            state.stats.dropped += 1;
        }
        state.stats.submitted += 1;
        drop(state);
        self.ready.notify_one();
    }

    /// Block until a new item is available and take it.
    ///
    /// Returns `None` once the slot is [closed](Self::close).
    pub fn take_latest(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(item) = Self::take(&mut state) {
                return Some(item);
            }
            state = self.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`take_latest`](Self::take_latest) but gives up after `timeout`.
    pub fn take_latest_timeout(&self, timeout: Duration) -> Option<T> {
        let state = self.lock();
        let (mut state, _) = self
            .ready
            .wait_timeout_while(state, timeout, |s| !s.closed && s.latest.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return None;
        }
        Self::take(&mut state)
    }

    /// Take the pending item without waiting.
    pub fn try_take_latest(&self) -> Option<T> {
        Self::take(&mut self.lock())
    }

    /// Whether an item is waiting to be taken.
    pub fn has_pending(&self) -> bool {
        self.lock().latest.is_some()
    }

    /// Wake every waiter; takes return `None` until [`reopen`](Self::reopen).
    /// Submissions are still accepted.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn reopen(&self) {
        self.lock().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> SlotStats {
        self.lock().stats
    }

    fn take(state: &mut SlotState<T>) -> Option<T> {
        let item = state.latest.take()?;
        state.stats.taken += 1;
        Some(item)
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        // Every critical section leaves the state consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

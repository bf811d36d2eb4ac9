use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::WorkerError;

enum State<T> {
    Idle(T),
    Running(JoinHandle<T>),
    Lost,
}

/// A restartable background thread that owns its state.
///
/// While stopped the payload lives here; `start` moves it into the thread and
/// `stop` joins the thread and takes it back. The thread body must return
/// soon after the shared running flag goes false.
pub struct Worker<T> {
    name: &'static str,
    running: Arc<AtomicBool>,
    state: State<T>,
}

impl<T: Send + 'static> Worker<T> {
    pub fn new(name: &'static str, payload: T) -> Self {
        Self {
            name,
            running: Arc::new(AtomicBool::new(false)),
            state: State::Idle(payload),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True while the thread is alive. A body that returned on its own (or
    /// panicked) counts as not running even before `stop` joins it.
    pub fn is_running(&self) -> bool {
        matches!(&self.state, State::Running(handle) if !handle.is_finished())
    }

    /// Spawn the thread. A no-op if it is already running; a thread that
    /// already exited is joined first and its payload reused.
    pub fn start<F>(&mut self, body: F) -> Result<(), WorkerError>
    where
        F: FnOnce(T, Arc<AtomicBool>) -> T + Send + 'static,
    {
        let payload = match mem::replace(&mut self.state, State::Lost) {
            State::Idle(payload) => payload,
            State::Running(handle) if handle.is_finished() => match handle.join() {
                Ok(payload) => {
                    log::debug!("{} exited on its own, restarting", self.name);
                    payload
                }
                Err(_) => return Err(WorkerError::Panicked(self.name)),
            },
            running @ State::Running(_) => {
                self.state = running;
                return Ok(());
            }
            State::Lost => return Err(WorkerError::Lost(self.name)),
        };

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let spawned = thread::Builder::new()
            .name(self.name.to_owned())
            .spawn(move || body(payload, running));
        match spawned {
            Ok(handle) => {
                self.state = State::Running(handle);
                log::info!("{} started", self.name);
                Ok(())
            }
            Err(source) => {
                self.running.store(false, Ordering::Release);
                Err(WorkerError::Spawn {
                    name: self.name,
                    source,
                })
            }
        }
    }

    /// Clear the running flag, call `wake` to unblock the thread and join it.
    /// A no-op if it is not running.
    pub fn stop(&mut self, wake: impl FnOnce()) -> Result<(), WorkerError> {
        let handle = match mem::replace(&mut self.state, State::Lost) {
            State::Running(handle) => handle,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        self.running.store(false, Ordering::Release);
        wake();
        match handle.join() {
            Ok(payload) => {
                self.state = State::Idle(payload);
                log::info!("{} stopped", self.name);
                Ok(())
            }
            Err(_) => Err(WorkerError::Panicked(self.name)),
        }
    }

    /// Access the payload while stopped.
    pub fn with_payload<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        match &mut self.state {
            State::Idle(payload) => Some(f(payload)),
            _ => None,
        }
    }
}

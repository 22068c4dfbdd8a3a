//! Race-free cancellation of a worker's notifications
//!
//! A worker routes every intermediate notification through
//! [`DeliveryGate::deliver`] and ends with [`DeliveryGate::finish`]. Once
//! `cancel` or `abort` has returned, no further intermediate notification
//! starts, and any that was in flight on another thread has completed. Only
//! one of `cancel` and `finish` can win: a cancel after `finish` returns false.

use std::sync::{Condvar, Mutex, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::sync::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Cancelled,
    Aborted,
    Finished,
}

/// How a gated run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed,
    Cancelled,
    Aborted,
}

#[derive(Debug)]
struct GateState {
    phase: Phase,
    delivering: bool,
}

#[derive(Debug)]
pub(crate) struct DeliveryGate {
    state: Mutex<GateState>,
    changed: Condvar,
    worker: OnceLock<ThreadId>,
}

/// Clears the delivering flag even if the listener panics
struct Delivering<'a>(&'a DeliveryGate);

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.0.state);
        state.delivering = false;
        self.0.changed.notify_all();
    }
}

impl Default for DeliveryGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryGate {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                phase: Phase::Running,
                delivering: false,
            }),
            changed: Condvar::new(),
            worker: OnceLock::new(),
        }
    }

    /// Records the calling thread as the worker, so that a listener cancelling
    /// from inside its own callback does not wait for itself
    pub(crate) fn bind_worker(&self) {
        let _ = self.worker.set(thread::current().id());
    }

    fn on_worker(&self) -> bool {
        self.worker.get() == Some(&thread::current().id())
    }

    /// Runs `notify` if the run is still going. Returns whether it ran.
    pub(crate) fn deliver(&self, notify: impl FnOnce()) -> bool {
        {
            let mut state = lock(&self.state);
            if state.phase != Phase::Running {
                return false;
            }
            state.delivering = true;
        }
        let _delivering = Delivering(self);
        notify();
        true
    }

    fn stop(&self, phase: Phase) -> bool {
        let mut state = lock(&self.state);
        if state.phase != Phase::Running {
            return false;
        }
        state.phase = phase;
        self.changed.notify_all();
        if !self.on_worker() {
            while state.delivering {
                state = self.changed.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        }
        true
    }

    /// Stops a running run on behalf of its owner
    pub(crate) fn cancel(&self) -> bool {
        self.stop(Phase::Cancelled)
    }

    /// Stops a running run because a device it depends on went away
    pub(crate) fn abort(&self) -> bool {
        self.stop(Phase::Aborted)
    }

    pub(crate) fn is_stopped(&self) -> bool {
        matches!(lock(&self.state).phase, Phase::Cancelled | Phase::Aborted)
    }

    /// Waits up to `duration`, waking early when stopped. Returns whether the
    /// run is still going.
    pub(crate) fn sleep(&self, duration: Duration) -> bool {
        let state = lock(&self.state);
        let (state, _) = self
            .changed
            .wait_timeout_while(state, duration, |state| state.phase == Phase::Running)
            .unwrap_or_else(PoisonError::into_inner);
        state.phase == Phase::Running
    }

    /// Closes the gate for good and reports how the run ended
    pub(crate) fn finish(&self) -> Outcome {
        let mut state = lock(&self.state);
        let outcome = match state.phase {
            Phase::Cancelled => Outcome::Cancelled,
            Phase::Aborted => Outcome::Aborted,
            Phase::Running | Phase::Finished => Outcome::Completed,
        };
        state.phase = Phase::Finished;
        self.changed.notify_all();
        outcome
    }
}

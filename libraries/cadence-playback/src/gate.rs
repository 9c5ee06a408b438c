//! Resume gate
//!
//! A render thread waits here until the controller has finished wiring up
//! the new session, so a resume from a checkpoint starts only once the
//! session is complete.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Closed,
    Open,
    Cancelled,
}

#[derive(Debug)]
pub(crate) struct ResumeGate {
    state: Mutex<GateState>,
    signal: Condvar,
}

impl ResumeGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Closed),
            signal: Condvar::new(),
        }
    }

    /// Let the waiting thread start playing
    pub fn open(&self) {
        self.set(GateState::Open);
    }

    /// Tell the waiting thread to give up without playing
    pub fn cancel(&self) {
        self.set(GateState::Cancelled);
    }

    fn set(&self, next: GateState) {
        let mut state = self.state.lock();
        if *state == GateState::Closed {
            *state = next;
        }
        self.signal.notify_all();
    }

    /// Wait until opened, cancelled or `timeout` elapsed
    ///
    /// Returns `false` only when cancelled. A timeout proceeds so a missed
    /// notification cannot stall playback forever.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state == GateState::Closed {
            if self.signal.wait_until(&mut state, deadline).timed_out() {
                tracing::warn!(?timeout, "Resume gate timed out, starting anyway");
                break;
            }
        }
        *state != GateState::Cancelled
    }
}

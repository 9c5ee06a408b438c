//! Lock-free transport flags
//!
//! Read by the progress thread on every tick and by device callbacks, so
//! they live outside the state mutex.

use cadence_core::HandleId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct TransportFlags {
    pub is_paused: AtomicBool,
    pub song_finished: AtomicBool,
    pub pressed_next: AtomicBool,
    pub pressed_prev: AtomicBool,
    pub pressed_shuffle: AtomicBool,
    /// Replay or seek: the next stop is a reposition, not a pause
    pub pressed_replay: AtomicBool,
    /// A caller is tearing the session down and owns the next transition
    pub tearing_down: AtomicBool,
    /// Id of the handle whose callbacks are current (0 = none)
    active_handle: AtomicU64,
}

impl TransportFlags {
    pub fn navigating(&self) -> bool {
        self.pressed_next.load(Ordering::SeqCst)
            || self.pressed_prev.load(Ordering::SeqCst)
            || self.pressed_shuffle.load(Ordering::SeqCst)
    }

    pub fn clear_navigation(&self) {
        self.pressed_next.store(false, Ordering::SeqCst);
        self.pressed_prev.store(false, Ordering::SeqCst);
        self.pressed_shuffle.store(false, Ordering::SeqCst);
    }

    /// Any condition that ends a progress loop
    pub fn progress_should_stop(&self) -> bool {
        self.is_paused.load(Ordering::SeqCst)
            || self.song_finished.load(Ordering::SeqCst)
            || self.pressed_replay.load(Ordering::SeqCst)
            || self.navigating()
            || self.active_handle.load(Ordering::SeqCst) == 0
    }

    pub fn set_active(&self, handle: HandleId) {
        self.active_handle.store(handle.get(), Ordering::SeqCst);
    }

    pub fn clear_active(&self) {
        self.active_handle.store(0, Ordering::SeqCst);
    }

    pub fn is_active(&self, handle: HandleId) -> bool {
        self.active_handle.load(Ordering::SeqCst) == handle.get()
    }

    pub fn has_active(&self) -> bool {
        self.active_handle.load(Ordering::SeqCst) != 0
    }
}

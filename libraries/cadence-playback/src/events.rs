//! Player events
//!
//! One-way notifications for the UI layer. The controller never waits on a
//! sink; delivery failures are dropped.

use crate::types::RepeatMode;
use cadence_core::{PlaylistRef, TrackRef};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// A track (song or ad) became current
    SongLoaded(TrackRef),

    /// The active playlist changed (`None` = cleared)
    PlaylistLoaded(Option<PlaylistRef>),

    /// Audio started flowing
    PlaybackStarted,

    /// Playback paused, or ended naturally
    PlaybackPaused,

    /// Periodic position update (~20 Hz while playing)
    Progress {
        /// Frame offset from the track start
        frame: u64,
        /// Time offset from the track start
        time_ms: u64,
    },

    RepeatModeChanged(RepeatMode),

    /// An ad replaced the requested track
    AdOn,

    /// The current track is not an ad
    AdOff,

    /// Stored gain changed
    VolumeChanged(f32),

    VisualizerToggled(bool),

    /// Loading or rendering failed; nothing is playing
    LoadFailed {
        /// Human-readable reason
        reason: String,
    },
}

/// Receiver of player events
pub trait EventSink: Send + Sync {
    fn notify(&self, event: PlayerEvent);
}

impl EventSink for Sender<PlayerEvent> {
    fn notify(&self, event: PlayerEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.send(event);
    }
}

/// Unbounded event channel
pub fn event_channel() -> (Sender<PlayerEvent>, Receiver<PlayerEvent>) {
    crossbeam_channel::unbounded()
}

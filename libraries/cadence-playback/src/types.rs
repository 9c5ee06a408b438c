//! Core types for playback control

use cadence_core::{PlaylistRef, TrackRef};
use serde::{Deserialize, Serialize};

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Stop when the playlist ends
    #[default]
    NoRepeat,

    /// Loop the playlist
    RepeatAll,

    /// Loop the current track
    RepeatOne,
}

impl RepeatMode {
    /// NoRepeat → RepeatAll → RepeatOne → NoRepeat
    #[must_use]
    pub fn cycle(self) -> Self {
        match self {
            Self::NoRepeat => Self::RepeatAll,
            Self::RepeatAll => Self::RepeatOne,
            Self::RepeatOne => Self::NoRepeat,
        }
    }
}

/// Snapshot of the controller state
///
/// `current_frame` and `current_time_ms` hold the resume checkpoint; they
/// are only meaningful while `is_paused` is set. Use
/// `PlaybackController::position` for the live position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_track: Option<TrackRef>,
    pub current_playlist: Option<PlaylistRef>,
    pub current_index: usize,
    pub current_frame: u64,
    pub current_time_ms: u64,
    pub is_paused: bool,
    pub song_finished: bool,
    pub pressed_next: bool,
    pub pressed_prev: bool,
    pub pressed_shuffle: bool,
    pub pressed_replay: bool,
    pub repeat_mode: RepeatMode,
    pub having_ad: bool,
    pub volume_gain_db: f32,
}

/// Live playback position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    pub frame: u64,
    pub time_ms: u64,
}

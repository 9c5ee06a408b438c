/// Track reference types
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::TrackId;

/// A playable unit (song or advertisement)
///
/// Timing fields describe the compressed stream: `frame_count` decode
/// frames spread over `duration`. Together they define the frame rate used
/// to convert between wall-clock time and frame offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRef {
    /// Unique track identifier
    pub id: TrackId,

    /// Display title
    pub title: String,

    /// Display artist
    pub artist: Option<String>,

    /// Total duration
    pub duration: Duration,

    /// Total number of decode frames (0 = not yet known)
    pub frame_count: u64,

    /// Locator handed to the audio source to fetch bytes
    pub locator: String,

    /// Advertisement rather than a song
    pub is_advertisement: bool,
}

impl TrackRef {
    /// Create a song reference with unknown timing
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            duration: Duration::ZERO,
            frame_count: 0,
            locator: locator.into(),
            is_advertisement: false,
        }
    }

    /// Create an advertisement reference with unknown timing
    pub fn advertisement(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        locator: impl Into<String>,
    ) -> Self {
        Self {
            is_advertisement: true,
            ..Self::new(id, title, locator)
        }
    }

    /// Set the artist
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Set duration and frame count
    #[must_use]
    pub fn with_timing(mut self, duration: Duration, frame_count: u64) -> Self {
        self.duration = duration;
        self.frame_count = frame_count;
        self
    }

    /// Copy of this reference with timing taken from probed metadata
    #[must_use]
    pub fn with_metadata(&self, metadata: &TrackMetadata) -> Self {
        self.clone()
            .with_timing(metadata.duration, metadata.frame_count)
    }

    /// Duration in whole milliseconds
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Frames per millisecond (`frame_count / duration_ms`), 0.0 when timing is unknown
    pub fn frame_rate(&self) -> f64 {
        let duration_ms = self.duration.as_secs_f64() * 1000.0;
        if self.frame_count == 0 || duration_ms <= 0.0 {
            return 0.0;
        }
        self.frame_count as f64 / duration_ms
    }

    /// Frame offset for a time offset, rounded to the nearest frame
    pub fn ms_to_frame(&self, ms: u64) -> u64 {
        (ms as f64 * self.frame_rate()).round() as u64
    }

    /// Time offset for a frame offset, rounded to the nearest millisecond
    pub fn frame_to_ms(&self, frame: u64) -> u64 {
        let rate = self.frame_rate();
        if rate <= 0.0 {
            return 0;
        }
        (frame as f64 / rate).round() as u64
    }

    /// Whether `frame` lies at or past `ratio` of the total frame count.
    ///
    /// Tracks with an unknown frame count always count as complete.
    pub fn is_complete_at(&self, frame: u64, ratio: f64) -> bool {
        if self.frame_count == 0 {
            return true;
        }
        frame as f64 >= ratio * self.frame_count as f64
    }
}

/// Technical metadata reported by an audio source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Total duration
    pub duration: Duration,

    /// Total number of decode frames
    pub frame_count: u64,

    /// MIME type, when the source reports one
    pub mime: Option<String>,
}

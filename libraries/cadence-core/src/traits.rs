/// Collaborator traits for Cadence
///
/// The playback controller talks to the outside world only through these
/// traits. Desktop implementations live in `cadence-audio-desktop`.
use crate::error::Result;
use crate::types::{HandleId, PlaylistRef, TrackMetadata, TrackRef, UserId};
use rand::seq::SliceRandom;
use std::io::{Read, Seek};
use std::sync::Arc;

/// Seekable byte stream of compressed audio
pub trait ByteStream: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> ByteStream for T {}

/// Audio source trait
///
/// Resolves a track locator to bytes and technical metadata.
pub trait AudioSource: Send + Sync {
    /// Open a byte stream for the locator
    ///
    /// # Errors
    /// Returns `CadenceError::SourceUnavailable` on any fetch failure
    fn fetch_bytes(&self, locator: &str) -> Result<Box<dyn ByteStream>>;

    /// Fetch duration, frame count and MIME type for the locator
    fn fetch_metadata(&self, locator: &str) -> Result<TrackMetadata>;
}

/// Output device trait
///
/// Opens a byte stream for rendering. Each call yields a fresh handle with a
/// fresh `HandleId`.
pub trait OutputDevice: Send + Sync {
    /// Prepare a handle that will render `stream`
    ///
    /// `listener` receives the lifecycle callbacks of the returned handle.
    ///
    /// # Errors
    /// Returns `CadenceError::DeviceInit` if the stream cannot be decoded or
    /// the device cannot be prepared
    fn open(
        &self,
        stream: Box<dyn ByteStream>,
        listener: Arc<dyn PlaybackListener>,
    ) -> Result<Arc<dyn DeviceHandle>>;
}

/// One opened rendering session
pub trait DeviceHandle: Send + Sync {
    fn id(&self) -> HandleId;

    /// Render until end of stream or until `stop` is called (blocking)
    ///
    /// Starts at `start_frame` when given, otherwise at frame 0. Invokes
    /// `on_started` once audio flows and `on_finished` exactly once when
    /// rendering ends, both on the calling thread.
    fn play(&self, start_frame: Option<u64>) -> Result<()>;

    /// Ask a running `play` call to return. Idempotent.
    fn stop(&self);

    /// Gain control, if one can be attached right now
    fn gain_control(&self) -> Option<Arc<dyn GainControl>>;
}

/// Master gain of a device handle, in decibels
pub trait GainControl: Send + Sync {
    fn min_db(&self) -> f32;
    fn max_db(&self) -> f32;
    fn gain_db(&self) -> f32;
    fn set_gain_db(&self, db: f32);
}

/// Lifecycle callback target of a device handle
pub trait PlaybackListener: Send + Sync {
    /// Audio started flowing
    fn on_started(&self, handle: HandleId);

    /// Rendering ended, naturally or because of `stop`
    ///
    /// `frame` is the absolute frame index (counted from the start of the
    /// track) at which rendering stopped.
    fn on_finished(&self, handle: HandleId, frame: u64);
}

/// Advertisement policy trait
pub trait AdvertisementPolicy: Send + Sync {
    /// Whether the next load for `user` should be replaced by an ad
    fn should_show_ad(&self, user: &UserId) -> bool;

    /// Ads available for insertion
    fn catalog(&self) -> Vec<TrackRef>;

    /// Pick an ad, uniformly at random from the catalog by default
    fn pick_ad(&self) -> Option<TrackRef> {
        self.catalog().choose(&mut rand::thread_rng()).cloned()
    }

    /// Record that a song was played (or skipped) by `user`
    fn note_play(&self, user: &UserId);

    /// Reset the counter of `user` after an ad was shown
    fn reset_counter(&self, user: &UserId);
}

/// Library backend trait
///
/// The playlist and play-history persistence the controller relies on.
pub trait LibraryBackend: Send + Sync {
    /// All playlists owned by `user`
    fn fetch_user_playlists(&self, user: &UserId) -> Result<Vec<PlaylistRef>>;

    /// Append a play-history entry
    fn record_play(&self, user: &UserId, track: &TrackRef) -> Result<()>;
}

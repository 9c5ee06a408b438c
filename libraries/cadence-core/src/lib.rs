//! Cadence Core
//!
//! Platform-agnostic types and collaborator traits for the Cadence playback
//! engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `TrackRef`, `PlaylistRef`, `TrackMetadata` and the id newtypes
//! - **Collaborator Traits**: `AudioSource`, `OutputDevice`, `DeviceHandle`,
//!   `GainControl`, `PlaybackListener`, `AdvertisementPolicy`, `LibraryBackend`
//! - **Error Handling**: Unified `CadenceError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use cadence_core::types::{PlaylistKind, PlaylistRef, TrackRef};
//! use std::time::Duration;
//!
//! let track = TrackRef::new("intro", "Intro", "https://cdn.example.com/intro.mp3")
//!     .with_timing(Duration::from_secs(120), 4_594);
//!
//! let playlist = PlaylistRef::new("mix", "Morning Mix", PlaylistKind::UserPlaylist)
//!     .with_tracks(vec![track.clone()]);
//!
//! assert_eq!(playlist.index_of(&track.id), Some(0));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{CadenceError, Result};
pub use traits::{
    AdvertisementPolicy, AudioSource, ByteStream, DeviceHandle, GainControl, LibraryBackend,
    OutputDevice, PlaybackListener,
};
pub use types::{
    HandleId, PlaylistId, PlaylistKind, PlaylistRef, TrackId, TrackMetadata, TrackRef, UserId,
};

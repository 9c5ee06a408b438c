//! Cadence - Playback Control
//!
//! Platform-agnostic playback engine for Cadence.
//!
//! This crate provides:
//! - Transport control (load, play, pause, stop, next, previous, shuffle, replay, seek)
//! - Repeat modes (NoRepeat, RepeatAll, RepeatOne)
//! - A progress reporter thread emitting positions at ~20 Hz
//! - Ad insertion that substitutes an ad and resumes the requested track afterwards
//! - Gain control in dB
//!
//! # Architecture
//!
//! `cadence-playback` has no audio or network dependencies. Bytes, decoding,
//! output, ads and playlists come from the collaborator traits defined in
//! `cadence-core`; `cadence-audio-desktop` implements them for desktops.
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_playback::{
//!     event_channel, Collaborators, CooldownAdPolicy, PlaybackConfig, PlaybackController,
//! };
//! # use cadence_core::{AudioSource, OutputDevice, LibraryBackend};
//! # use std::sync::Arc;
//! # fn demo(
//! #     source: Arc<dyn AudioSource>,
//! #     device: Arc<dyn OutputDevice>,
//! #     library: Arc<dyn LibraryBackend>,
//! # ) -> cadence_playback::Result<()> {
//! let config = PlaybackConfig::default();
//! let (events, receiver) = event_channel();
//!
//! let controller = PlaybackController::new(
//!     config.clone(),
//!     Collaborators {
//!         source,
//!         device,
//!         ads: Arc::new(CooldownAdPolicy::new(&config.ads, Vec::new())),
//!         library,
//!         events: Arc::new(events),
//!     },
//! )?;
//!
//! controller.set_volume(-6.0);
//! controller.next()?;
//! for event in receiver.try_iter() {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod ads;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod events;
mod gate;
pub mod progress;
pub mod shuffle;
mod transport;
pub mod types;
pub mod volume;

pub use ads::CooldownAdPolicy;
pub use config::{AdSettings, PlaybackConfig};
pub use controller::{Collaborators, PlaybackController};
pub use cursor::{advance, Direction, Step};
pub use error::{PlaybackError, Result};
pub use events::{event_channel, EventSink, PlayerEvent};
pub use progress::ProgressClock;
pub use types::{PlaybackState, Position, RepeatMode};

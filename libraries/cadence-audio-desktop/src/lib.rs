//! Desktop audio for Cadence
//!
//! Implements the `cadence-core` collaborator traits for desktop systems:
//!
//! - [`CpalOutputDevice`]: decodes with Symphonia, resamples with rubato when
//!   the device rate differs, and renders to the default CPAL output
//! - [`HttpAudioSource`] and [`FileAudioSource`]: fetch audio bytes and
//!   probe technical metadata
//! - [`DesktopAudioSource`]: picks one of the two by locator scheme
//!
//! # Example
//!
//! ```no_run
//! use cadence_audio_desktop::{CpalOutputDevice, DesktopAudioSource};
//! use cadence_core::AudioSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = DesktopAudioSource::new()?;
//! let metadata = source.fetch_metadata("/music/track.mp3")?;
//! println!("{} frames, {:?}", metadata.frame_count, metadata.duration);
//!
//! let _device = CpalOutputDevice::new();
//! # Ok(())
//! # }
//! ```

mod decode;
mod error;
pub mod metadata;
mod output;
mod resample;
pub mod sources;

pub use decode::TrackDecoder;
pub use error::{AudioError, Result};
pub use metadata::probe_metadata;
pub use output::{CpalHandle, CpalOutputDevice, StreamGain, MAX_GAIN_DB, MIN_GAIN_DB};
pub use sources::{DesktopAudioSource, FileAudioSource, HttpAudioSource};

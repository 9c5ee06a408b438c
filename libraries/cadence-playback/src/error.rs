//! Error types for playback control

use cadence_core::CadenceError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The audio source could not deliver bytes or metadata
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The output device could not be opened for the track
    #[error("Device initialization failed: {0}")]
    DeviceInitFailure(String),

    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Library backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CadenceError> for PlaybackError {
    fn from(err: CadenceError) -> Self {
        match err {
            CadenceError::SourceUnavailable { .. } | CadenceError::Io(_) => {
                Self::SourceUnavailable(err.to_string())
            }
            CadenceError::DeviceInit(msg) | CadenceError::Render(msg) => {
                Self::DeviceInitFailure(msg)
            }
            CadenceError::Backend(msg) => Self::Backend(msg),
        }
    }
}

impl From<config::ConfigError> for PlaybackError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

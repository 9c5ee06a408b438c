/// Desktop audio errors
use cadence_core::CadenceError;
use thiserror::Error;

/// Result type for desktop audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Desktop audio errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// No default output device
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device error
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to start stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// Container or codec not recognised
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Packet could not be read or decoded
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Sample rate conversion error
    #[error("Sample rate conversion error: {0}")]
    ResampleError(String),

    /// The handle was already played once
    #[error("Handle already consumed")]
    AlreadyPlayed,
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioError::StreamBuildError(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::PlayError(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::DeviceError(err.to_string())
    }
}

impl From<AudioError> for CadenceError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::DecodeError(_)
            | AudioError::ResampleError(_)
            | AudioError::AlreadyPlayed => CadenceError::render(err.to_string()),
            AudioError::DeviceNotFound
            | AudioError::DeviceError(_)
            | AudioError::StreamBuildError(_)
            | AudioError::PlayError(_)
            | AudioError::UnsupportedFormat(_) => CadenceError::device_init(err.to_string()),
        }
    }
}

/// Core error types for Cadence
use thiserror::Error;

/// Result type alias using `CadenceError`
pub type Result<T> = std::result::Result<T, CadenceError>;

/// Error raised by a collaborator behind one of the core traits
#[derive(Error, Debug)]
pub enum CadenceError {
    /// The byte source or its metadata could not be fetched
    #[error("Source unavailable for '{locator}': {reason}")]
    SourceUnavailable { locator: String, reason: String },

    /// The output device could not be prepared for the stream
    #[error("Device initialization failed: {0}")]
    DeviceInit(String),

    /// Rendering failed after the device was opened
    #[error("Render error: {0}")]
    Render(String),

    /// Library backend (playlists, play history) failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CadenceError {
    /// Create a source-unavailable error
    pub fn source_unavailable(locator: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a device initialization error
    pub fn device_init(msg: impl Into<String>) -> Self {
        Self::DeviceInit(msg.into())
    }

    /// Create a render error
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

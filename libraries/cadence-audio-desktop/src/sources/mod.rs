//! Audio source implementations for desktop

pub mod http;
pub mod local;

pub use http::HttpAudioSource;
pub use local::FileAudioSource;

use cadence_core::{AudioSource, ByteStream, Result, TrackMetadata};

/// Routes `http(s)://` locators to HTTP and everything else to the filesystem
pub struct DesktopAudioSource {
    http: HttpAudioSource,
    files: FileAudioSource,
}

impl DesktopAudioSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: HttpAudioSource::new()?,
            files: FileAudioSource::new(),
        })
    }

    fn route(&self, locator: &str) -> &dyn AudioSource {
        if HttpAudioSource::handles(locator) {
            &self.http
        } else {
            &self.files
        }
    }
}

impl AudioSource for DesktopAudioSource {
    fn fetch_bytes(&self, locator: &str) -> Result<Box<dyn ByteStream>> {
        self.route(locator).fetch_bytes(locator)
    }

    fn fetch_metadata(&self, locator: &str) -> Result<TrackMetadata> {
        self.route(locator).fetch_metadata(locator)
    }
}

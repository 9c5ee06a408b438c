//! Local file audio source
//!
//! Locators are plain paths or `file://` URLs.

use crate::metadata::probe_metadata;
use cadence_core::{AudioSource, ByteStream, CadenceError, Result, TrackMetadata};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Serves audio bytes from the local filesystem
#[derive(Debug, Default, Clone)]
pub struct FileAudioSource {
    /// Base directory for relative locators
    root: Option<PathBuf>,
}

impl FileAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative locators against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Filesystem path for `locator`
    pub fn resolve(&self, locator: &str) -> PathBuf {
        let path = Path::new(locator.strip_prefix("file://").unwrap_or(locator));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn open(&self, locator: &str) -> Result<(BufReader<File>, PathBuf)> {
        let path = self.resolve(locator);
        let file = File::open(&path).map_err(|e| CadenceError::source_unavailable(locator, e))?;
        Ok((BufReader::new(file), path))
    }
}

impl AudioSource for FileAudioSource {
    fn fetch_bytes(&self, locator: &str) -> Result<Box<dyn ByteStream>> {
        let (reader, path) = self.open(locator)?;
        tracing::debug!(path = %path.display(), "Opened local file");
        Ok(Box::new(reader))
    }

    fn fetch_metadata(&self, locator: &str) -> Result<TrackMetadata> {
        let (reader, path) = self.open(locator)?;
        let extension = path.extension().and_then(|e| e.to_str());
        probe_metadata(Box::new(reader), extension)
            .map_err(|e| CadenceError::source_unavailable(locator, e))
    }
}

//! HTTP audio source
//!
//! Downloads the whole file with an async `reqwest` client driven by a
//! private tokio runtime. The most recent download is kept, so the metadata
//! probe and the following byte fetch for the same track hit the network
//! once.

use crate::metadata::probe_metadata;
use cadence_core::{AudioSource, ByteStream, CadenceError, Result, TrackMetadata};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct Download {
    locator: String,
    bytes: Arc<[u8]>,
    content_type: Option<String>,
}

/// Fetches audio over HTTP(S)
pub struct HttpAudioSource {
    client: reqwest::Client,
    runtime: Runtime,
    last: Mutex<Option<Download>>,
}

impl HttpAudioSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CadenceError::backend(format!("Failed to build HTTP client: {e}")))?;
        let runtime = Runtime::new()?;

        Ok(Self {
            client,
            runtime,
            last: Mutex::new(None),
        })
    }

    /// Whether `locator` is an HTTP(S) URL
    pub fn handles(locator: &str) -> bool {
        locator.starts_with("http://") || locator.starts_with("https://")
    }

    fn download(&self, locator: &str) -> Result<Download> {
        if let Some(hit) = self.last.lock().as_ref().filter(|d| d.locator == locator) {
            return Ok(hit.clone());
        }
        if !Self::handles(locator) {
            return Err(CadenceError::source_unavailable(locator, "not an HTTP URL"));
        }

        let download = self
            .runtime
            .block_on(fetch(&self.client, locator))
            .map_err(|reason| CadenceError::source_unavailable(locator, reason))?;

        tracing::debug!(
            url = locator,
            bytes = download.bytes.len(),
            content_type = ?download.content_type,
            "Downloaded audio"
        );
        *self.last.lock() = Some(download.clone());
        Ok(download)
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> std::result::Result<Download, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP error: {status}"));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;

    Ok(Download {
        locator: url.to_string(),
        bytes: Arc::from(bytes.as_ref()),
        content_type,
    })
}

/// File extension hinted by a MIME type
fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/ogg" => Some("ogg"),
        "audio/mp4" | "audio/aac" => Some("m4a"),
        _ => None,
    }
}

impl AudioSource for HttpAudioSource {
    fn fetch_bytes(&self, locator: &str) -> Result<Box<dyn ByteStream>> {
        let download = self.download(locator)?;
        Ok(Box::new(Cursor::new(download.bytes)))
    }

    fn fetch_metadata(&self, locator: &str) -> Result<TrackMetadata> {
        let download = self.download(locator)?;
        let extension = download.content_type.as_deref().and_then(extension_for_mime);

        let mut metadata = probe_metadata(Box::new(Cursor::new(download.bytes)), extension)
            .map_err(|e| CadenceError::source_unavailable(locator, e))?;
        if download.content_type.is_some() {
            metadata.mime = download.content_type;
        }
        Ok(metadata)
    }
}

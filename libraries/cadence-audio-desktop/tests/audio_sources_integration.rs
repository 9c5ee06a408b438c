//! Sources, probing and decoding against generated WAV files
//!
//! Nothing here needs an audio device: `open` only probes, and decoding is
//! exercised through `TrackDecoder` directly.

use cadence_audio_desktop::{CpalOutputDevice, FileAudioSource, TrackDecoder};
use cadence_core::{AudioSource, CadenceError, HandleId, OutputDevice, PlaybackListener};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ===== Test Helpers =====

struct SilentListener;

impl PlaybackListener for SilentListener {
    fn on_started(&self, _handle: HandleId) {}
    fn on_finished(&self, _handle: HandleId, _frame: u64) {}
}

/// Write `seconds` of a stereo 16-bit ramp at `sample_rate`
fn write_wav(dir: &Path, name: &str, sample_rate: u32, seconds: u32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..sample_rate * seconds {
        let sample = ((i % 200) as i16 - 100) * 100;
        writer.write_sample(sample).unwrap();
        writer.write_sample(-sample).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn decode_all(decoder: &mut TrackDecoder) -> usize {
    let mut samples = 0;
    while let Some(chunk) = decoder.next_stereo().unwrap() {
        samples += chunk.len();
    }
    samples
}

// ===== Metadata =====

#[test]
fn test_wav_metadata() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 8_000, 2);

    let source = FileAudioSource::new();
    let metadata = source.fetch_metadata(path.to_str().unwrap()).unwrap();

    assert_eq!(metadata.duration, Duration::from_secs(2));
    assert!(metadata.frame_count > 0);
    assert_eq!(metadata.mime.as_deref(), Some("audio/wav"));
}

#[test]
fn test_file_url_locator() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 8_000, 1);

    let source = FileAudioSource::new();
    let locator = format!("file://{}", path.display());
    assert!(source.fetch_bytes(&locator).is_ok());
}

#[test]
fn test_non_audio_file_fails_metadata() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"not audio at all").unwrap();

    let source = FileAudioSource::new();
    assert!(matches!(
        source.fetch_metadata(path.to_str().unwrap()),
        Err(CadenceError::SourceUnavailable { .. })
    ));
}

// ===== Decoding =====

#[test]
fn test_decoder_frames_match_metadata() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 8_000, 1);
    let source = FileAudioSource::new();
    let locator = path.to_str().unwrap();

    let metadata = source.fetch_metadata(locator).unwrap();
    let mut decoder = TrackDecoder::probe(source.fetch_bytes(locator).unwrap(), Some("wav")).unwrap();

    assert_eq!(decoder.sample_rate(), 8_000);
    assert_eq!(decode_all(&mut decoder), 8_000 * 2);
    assert_eq!(decoder.frames_read(), metadata.frame_count);
}

#[test]
fn test_decoder_skip_resumes_mid_stream() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 8_000, 1);
    let source = FileAudioSource::new();
    let locator = path.to_str().unwrap();
    let total = source.fetch_metadata(locator).unwrap().frame_count;

    let mut decoder = TrackDecoder::probe(source.fetch_bytes(locator).unwrap(), None).unwrap();
    let skipped = decoder.skip(total / 2).unwrap();
    assert_eq!(skipped, total / 2);

    decode_all(&mut decoder);
    assert_eq!(decoder.frames_read(), total);

    // Skipping past the end stops at the end
    let mut decoder = TrackDecoder::probe(source.fetch_bytes(locator).unwrap(), None).unwrap();
    assert_eq!(decoder.skip(total + 10).unwrap(), total);
}

// ===== Output Device =====

#[test]
fn test_open_probes_without_audio_device() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 44_100, 1);
    let source = FileAudioSource::new();

    let handle = CpalOutputDevice::new()
        .open(
            source.fetch_bytes(path.to_str().unwrap()).unwrap(),
            Arc::new(SilentListener),
        )
        .unwrap();

    // No output stream yet, so no gain control either
    assert!(handle.gain_control().is_none());
}

#[test]
fn test_open_rejects_garbage() {
    let result = CpalOutputDevice::new().open(
        Box::new(Cursor::new(vec![0u8; 1024])),
        Arc::new(SilentListener),
    );
    assert!(matches!(result, Err(CadenceError::DeviceInit(_))));
}

#[test]
fn test_distinct_handles() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 8_000, 1);
    let source = FileAudioSource::new();
    let device = CpalOutputDevice::new();
    let locator = path.to_str().unwrap();

    let first = device
        .open(source.fetch_bytes(locator).unwrap(), Arc::new(SilentListener))
        .unwrap();
    let second = device
        .open(source.fetch_bytes(locator).unwrap(), Arc::new(SilentListener))
        .unwrap();
    assert_ne!(first.id(), second.id());
}

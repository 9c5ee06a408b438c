//! Technical metadata probing
//!
//! Reads the whole stream once, counting packets of the default track.

use crate::decode::{next_track_packet, open_format};
use crate::error::Result;
use cadence_core::{ByteStream, TrackMetadata};
use std::time::Duration;

/// Guess a MIME type from a file extension
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "wav" | "wave" => "audio/wav",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "m4a" | "mp4" | "aac" => "audio/mp4",
        _ => return None,
    };
    Some(mime)
}

/// Probe `stream` for its duration and frame (packet) count
///
/// `extension` helps format detection; it also supplies the MIME type.
pub fn probe_metadata(stream: Box<dyn ByteStream>, extension: Option<&str>) -> Result<TrackMetadata> {
    let (mut format, track_id) = open_format(stream, extension)?;

    let (sample_rate, n_frames, time_base) = format
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .map(|t| {
            (
                t.codec_params.sample_rate,
                t.codec_params.n_frames,
                t.codec_params.time_base,
            )
        })
        .unwrap_or_default();

    let mut frame_count = 0u64;
    let mut end_ts = 0u64;
    while let Some(packet) = next_track_packet(format.as_mut(), track_id)? {
        frame_count += 1;
        end_ts = end_ts.max(packet.ts() + packet.dur());
    }

    let duration = match (n_frames, sample_rate, time_base) {
        (Some(frames), Some(rate), _) if rate > 0 => {
            Duration::from_secs_f64(frames as f64 / f64::from(rate))
        }
        (_, _, Some(tb)) => {
            let time = tb.calc_time(end_ts);
            Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac)
        }
        (_, Some(rate), None) if rate > 0 => {
            Duration::from_secs_f64(end_ts as f64 / f64::from(rate))
        }
        _ => Duration::ZERO,
    };

    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    tracing::debug!(frame_count, duration_ms, "Probed metadata");

    Ok(TrackMetadata {
        duration,
        frame_count,
        mime: extension.and_then(mime_for_extension).map(str::to_string),
    })
}

//! Packet decoding with Symphonia
//!
//! One container packet is one playback frame (for MP3, one MPEG frame), so
//! frame positions reported to the controller are packet counts of the
//! default track.
//!
//! Every sample format is normalised to interleaved stereo `f32`: mono is
//! duplicated, anything wider keeps its first two channels.

use crate::error::{AudioError, Result};
use cadence_core::ByteStream;
use std::io::{self, Read, Seek, SeekFrom};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Adapts a [`ByteStream`] to Symphonia's `MediaSource`
struct StreamSource(Box<dyn ByteStream>);

impl Read for StreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for StreamSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}

impl MediaSource for StreamSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

/// Probe the container and find its default audio track
pub(crate) fn open_format(
    stream: Box<dyn ByteStream>,
    extension: Option<&str>,
) -> Result<(Box<dyn FormatReader>, u32)> {
    let mss = MediaSourceStream::new(Box::new(StreamSource(stream)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to probe stream: {e}")))?;

    let format = probed.format;
    let track_id = format
        .default_track()
        .map(|track| track.id)
        .ok_or_else(|| AudioError::UnsupportedFormat("No audio tracks found".into()))?;

    Ok((format, track_id))
}

/// Next packet of `track_id`, `None` at end of stream
pub(crate) fn next_track_packet(
    format: &mut dyn FormatReader,
    track_id: u32,
) -> Result<Option<Packet>> {
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => return Ok(Some(packet)),
            Ok(_) => {}
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            // Chained streams are not followed
            Err(SymphoniaError::ResetRequired) => return Ok(None),
            Err(e) => return Err(AudioError::DecodeError(format!("Error reading packet: {e}"))),
        }
    }
}

/// Streaming decoder for the default track of a container
pub struct TrackDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    frames_read: u64,
}

impl TrackDecoder {
    /// Probe `stream` and build a codec decoder for its default track
    pub fn probe(stream: Box<dyn ByteStream>, extension: Option<&str>) -> Result<Self> {
        let (format, track_id) = open_format(stream, extension)?;

        let params = format
            .tracks()
            .iter()
            .find(|t| t.id == track_id)
            .map(|t| t.codec_params.clone())
            .ok_or_else(|| AudioError::UnsupportedFormat("Default track vanished".into()))?;

        let sample_rate = params.sample_rate.unwrap_or(44_100);
        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to create decoder: {e}")))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            frames_read: 0,
        })
    }

    /// Sample rate of the decoded audio
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Packets consumed so far, decoded or skipped
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Skip up to `frames` packets without decoding them
    ///
    /// Returns how many were skipped; fewer means the stream ended.
    pub fn skip(&mut self, frames: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < frames {
            if next_track_packet(self.format.as_mut(), self.track_id)?.is_none() {
                break;
            }
            skipped += 1;
        }
        self.frames_read += skipped;
        Ok(skipped)
    }

    /// Decode the next packet to interleaved stereo
    ///
    /// `None` at end of stream. A corrupt packet yields an empty buffer and
    /// still counts as a frame.
    pub fn next_stereo(&mut self) -> Result<Option<Vec<f32>>> {
        let Some(packet) = next_track_packet(self.format.as_mut(), self.track_id)? else {
            return Ok(None);
        };
        self.frames_read += 1;

        match self.decoder.decode(&packet) {
            Ok(decoded) => Ok(Some(to_stereo_f32(decoded))),
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::warn!(frame = self.frames_read - 1, msg, "Skipping corrupt packet");
                Ok(Some(Vec::new()))
            }
            Err(e) => Err(AudioError::DecodeError(e.to_string())),
        }
    }
}

fn interleave_stereo<T, F>(buf: &AudioBuffer<T>, normalize: F) -> Vec<f32>
where
    T: Sample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    let mut output = Vec::with_capacity(frames * 2);

    if channels == 0 {
        return output;
    }

    let left = buf.chan(0);
    let right = if channels > 1 { buf.chan(1) } else { left };
    for (l, r) in left.iter().zip(right.iter()) {
        output.push(normalize(*l));
        output.push(normalize(*r));
    }
    output
}

/// Convert any Symphonia sample format to interleaved stereo in [-1.0, 1.0]
pub(crate) fn to_stereo_f32(decoded: AudioBufferRef<'_>) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => interleave_stereo(&buf, |s| s),
        AudioBufferRef::F64(buf) => interleave_stereo(&buf, |s| s as f32),

        AudioBufferRef::S8(buf) => interleave_stereo(&buf, |s| s as f32 / i8::MAX as f32),
        AudioBufferRef::S16(buf) => interleave_stereo(&buf, |s| s as f32 / i16::MAX as f32),
        AudioBufferRef::S24(buf) => interleave_stereo(&buf, |s| s.inner() as f32 / 8_388_607.0),
        AudioBufferRef::S32(buf) => interleave_stereo(&buf, |s| s as f32 / i32::MAX as f32),

        AudioBufferRef::U8(buf) => {
            interleave_stereo(&buf, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U16(buf) => {
            interleave_stereo(&buf, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U24(buf) => {
            interleave_stereo(&buf, |s| (s.inner() as f32 / 16_777_215.0) * 2.0 - 1.0)
        }
        AudioBufferRef::U32(buf) => {
            interleave_stereo(&buf, |s| (s as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32)
        }
    }
}

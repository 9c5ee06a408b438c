/// CPAL-based output device
///
/// `open` only probes the stream; all audio work happens in
/// [`CpalHandle::play`] on the caller's (render) thread, which owns the CPAL
/// stream for its whole life. Decoded chunks reach the real-time callback
/// over a bounded channel.
use crate::decode::TrackDecoder;
use crate::error::{AudioError, Result};
use crate::resample::StereoResampler;
use cadence_core::{ByteStream, DeviceHandle, GainControl, HandleId, OutputDevice, PlaybackListener};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Chunks buffered between decoder and callback
const QUEUE_CHUNKS: usize = 32;
/// Chunks queued before `on_started` fires
const PREFILL_CHUNKS: usize = 8;
/// How often a blocked producer re-checks the stop flag
const STOP_POLL: Duration = Duration::from_millis(20);

/// Gain range exposed by [`StreamGain`]
pub const MIN_GAIN_DB: f32 = -40.0;
pub const MAX_GAIN_DB: f32 = 40.0;

/// Decoded audio for the callback, tagged with the frame it starts at
struct Chunk {
    frame: u64,
    samples: Vec<f32>,
}

/// Master gain shared with the audio callback
#[derive(Debug, Default)]
pub struct StreamGain {
    /// `f32` dB value stored as bits
    db_bits: AtomicU32,
}

impl StreamGain {
    /// Linear multiplier for the current gain
    pub fn linear(&self) -> f32 {
        10f32.powf(self.gain_db() / 20.0)
    }
}

impl GainControl for StreamGain {
    fn min_db(&self) -> f32 {
        MIN_GAIN_DB
    }

    fn max_db(&self) -> f32 {
        MAX_GAIN_DB
    }

    fn gain_db(&self) -> f32 {
        f32::from_bits(self.db_bits.load(Ordering::Relaxed))
    }

    fn set_gain_db(&self, db: f32) {
        let db = if db.is_nan() {
            0.0
        } else {
            db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
        };
        self.db_bits.store(db.to_bits(), Ordering::Relaxed);
    }
}

/// Default system output via CPAL
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalOutputDevice;

impl CpalOutputDevice {
    pub fn new() -> Self {
        Self
    }
}

impl OutputDevice for CpalOutputDevice {
    fn open(
        &self,
        stream: Box<dyn ByteStream>,
        listener: Arc<dyn PlaybackListener>,
    ) -> cadence_core::Result<Arc<dyn DeviceHandle>> {
        let decoder = TrackDecoder::probe(stream, None)?;
        let id = HandleId::next();
        debug!(handle = %id, sample_rate = decoder.sample_rate(), "Opened stream for playback");

        Ok(Arc::new(CpalHandle {
            id,
            listener,
            decoder: Mutex::new(Some(decoder)),
            stop: AtomicBool::new(false),
            gain: Mutex::new(None),
        }))
    }
}

/// One playback of one stream
pub struct CpalHandle {
    id: HandleId,
    listener: Arc<dyn PlaybackListener>,
    decoder: Mutex<Option<TrackDecoder>>,
    stop: AtomicBool,
    /// Present only while the output stream exists
    gain: Mutex<Option<Arc<StreamGain>>>,
}

impl CpalHandle {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Render to the default device until the stream ends or `stop` is called
    ///
    /// Returns the frame to report as the end position.
    fn render(&self, decoder: &mut TrackDecoder, start_frame: u64) -> Result<u64> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceNotFound)?;
        let supported = device.default_output_config()?;
        let device_rate = supported.sample_rate();
        let config = supported.config();

        let skipped = decoder.skip(start_frame)?;
        if skipped < start_frame {
            debug!(handle = %self.id, start_frame, skipped, "Start frame past end of stream");
        }

        let (tx, rx) = bounded::<Chunk>(QUEUE_CHUNKS);
        let played = Arc::new(AtomicU64::new(decoder.frames_read()));
        let gain = Arc::new(StreamGain::default());

        let stream = build_stream(&device, &config, rx, Arc::clone(&played), Arc::clone(&gain))?;
        stream.play()?;
        *self.gain.lock() = Some(gain);

        let mut resampler = if decoder.sample_rate() == device_rate {
            None
        } else {
            debug!(from = decoder.sample_rate(), to = device_rate, "Resampling");
            Some(StereoResampler::new(decoder.sample_rate(), device_rate)?)
        };

        info!(handle = %self.id, start_frame = decoder.frames_read(), "Rendering");

        let mut queued = 0usize;
        let mut started = false;
        loop {
            if self.stopped() {
                break;
            }

            let frame = decoder.frames_read();
            let samples = match decoder.next_stereo()? {
                Some(samples) => match resampler.as_mut() {
                    Some(r) => r.push(&samples)?,
                    None => samples,
                },
                None => {
                    let tail = match resampler.as_mut() {
                        Some(r) => r.flush()?,
                        None => Vec::new(),
                    };
                    if !tail.is_empty() {
                        self.send(&tx, Chunk { frame, samples: tail });
                    }
                    break;
                }
            };
            if samples.is_empty() {
                continue;
            }

            if !self.send(&tx, Chunk { frame, samples }) {
                break;
            }
            queued += 1;
            if !started && queued >= PREFILL_CHUNKS {
                started = true;
                self.listener.on_started(self.id);
            }
        }

        if !started {
            self.listener.on_started(self.id);
        }

        // Let the queue play out unless stopped
        while !self.stopped() && !tx.is_empty() {
            thread::sleep(STOP_POLL);
        }

        drop(stream);
        *self.gain.lock() = None;

        Ok(if self.stopped() {
            played.load(Ordering::SeqCst)
        } else {
            decoder.frames_read()
        })
    }

    /// Queue a chunk, giving up when stopped or the callback is gone
    fn send(&self, tx: &Sender<Chunk>, mut chunk: Chunk) -> bool {
        loop {
            if self.stopped() {
                return false;
            }
            match tx.send_timeout(chunk, STOP_POLL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => chunk = returned,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}

impl DeviceHandle for CpalHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn play(&self, start_frame: Option<u64>) -> cadence_core::Result<()> {
        let mut decoder = self.decoder.lock().take().ok_or(AudioError::AlreadyPlayed)?;

        let frame = self.render(&mut decoder, start_frame.unwrap_or(0))?;
        debug!(handle = %self.id, frame, "Rendering finished");
        self.listener.on_finished(self.id, frame);
        Ok(())
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn gain_control(&self) -> Option<Arc<dyn GainControl>> {
        self.gain
            .lock()
            .clone()
            .map(|gain| gain as Arc<dyn GainControl>)
    }
}

/// Callback-side state: drains chunks into the device buffer
struct Feeder {
    rx: Receiver<Chunk>,
    current: Vec<f32>,
    offset: usize,
    played: Arc<AtomicU64>,
    gain: Arc<StreamGain>,
    channels: usize,
}

impl Feeder {
    fn next_stereo_frame(&mut self) -> Option<(f32, f32)> {
        while self.offset + 1 >= self.current.len() {
            let chunk = self.rx.try_recv().ok()?;
            self.played.store(chunk.frame, Ordering::SeqCst);
            self.current = chunk.samples;
            self.offset = 0;
        }
        let frame = (self.current[self.offset], self.current[self.offset + 1]);
        self.offset += 2;
        Some(frame)
    }

    fn fill(&mut self, data: &mut [f32]) {
        let gain = self.gain.linear();
        for out in data.chunks_mut(self.channels) {
            let Some((left, right)) = self.next_stereo_frame() else {
                out.fill(0.0);
                continue;
            };
            match out {
                [mono] => *mono = (left + right) * 0.5 * gain,
                [l, r, rest @ ..] => {
                    *l = left * gain;
                    *r = right * gain;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    rx: Receiver<Chunk>,
    played: Arc<AtomicU64>,
    gain: Arc<StreamGain>,
) -> Result<Stream> {
    let mut feeder = Feeder {
        rx,
        current: Vec::new(),
        offset: 0,
        played,
        gain,
        channels: usize::from(config.channels).max(1),
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| feeder.fill(data),
        |err| error!("Audio stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feeder(channels: usize) -> (Feeder, Sender<Chunk>, Arc<AtomicU64>, Arc<StreamGain>) {
        let (tx, rx) = bounded(4);
        let played = Arc::new(AtomicU64::new(0));
        let gain = Arc::new(StreamGain::default());
        let feeder = Feeder {
            rx,
            current: Vec::new(),
            offset: 0,
            played: Arc::clone(&played),
            gain: Arc::clone(&gain),
            channels,
        };
        (feeder, tx, played, gain)
    }

    #[test]
    fn gain_is_clamped() {
        let gain = StreamGain::default();
        gain.set_gain_db(90.0);
        assert_eq!(gain.gain_db(), MAX_GAIN_DB);
        gain.set_gain_db(f32::NAN);
        assert_eq!(gain.gain_db(), 0.0);
        assert!((gain.linear() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn linear_gain_follows_decibels() {
        let gain = StreamGain::default();
        gain.set_gain_db(-20.0);
        assert!((gain.linear() - 0.1).abs() < 0.001);
        gain.set_gain_db(20.0);
        assert!((gain.linear() - 10.0).abs() < 0.001);
    }

    #[test]
    fn feeder_tracks_chunk_frames() {
        let (mut feeder, tx, played, _) = feeder(2);
        tx.send(Chunk { frame: 7, samples: vec![0.5, -0.5] }).unwrap();
        tx.send(Chunk { frame: 8, samples: vec![0.25, 0.25] }).unwrap();

        let mut out = [1.0_f32; 6];
        feeder.fill(&mut out);

        assert_eq!(out, [0.5, -0.5, 0.25, 0.25, 0.0, 0.0]);
        assert_eq!(played.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn feeder_downmixes_to_mono() {
        let (mut feeder, tx, _, gain) = feeder(1);
        gain.set_gain_db(-20.0);
        tx.send(Chunk { frame: 0, samples: vec![1.0, 0.0] }).unwrap();

        let mut out = [0.0_f32; 1];
        feeder.fill(&mut out);
        assert!((out[0] - 0.05).abs() < 1e-6);
    }

    #[test]
    fn feeder_silences_extra_channels() {
        let (mut feeder, tx, _, _) = feeder(4);
        tx.send(Chunk { frame: 0, samples: vec![0.1, 0.2] }).unwrap();

        let mut out = [1.0_f32; 4];
        feeder.fill(&mut out);
        assert_eq!(out, [0.1, 0.2, 0.0, 0.0]);
    }
}

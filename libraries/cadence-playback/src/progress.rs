//! Progress reporter
//!
//! One background thread per playback session. It converts elapsed wall
//! clock time into a frame offset, publishes the live position and emits a
//! `Progress` event every tick. It never touches the controller state: it
//! only reads the track constants it was started with and the transport
//! flags.

use crate::events::{EventSink, PlayerEvent};
use crate::transport::TransportFlags;
use crate::types::Position;
use cadence_core::TrackRef;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Live position published by the progress thread
#[derive(Debug, Default)]
pub struct ProgressClock {
    frame: AtomicU64,
    time_ms: AtomicU64,
}

impl ProgressClock {
    pub fn position(&self) -> Position {
        Position {
            frame: self.frame.load(Ordering::Acquire),
            time_ms: self.time_ms.load(Ordering::Acquire),
        }
    }

    pub(crate) fn publish(&self, position: Position) {
        self.time_ms.store(position.time_ms, Ordering::Release);
        self.frame.store(position.frame, Ordering::Release);
    }
}

/// Handle to a running progress thread
pub(crate) struct ProgressReporter {
    cancel: Arc<AtomicBool>,
    done: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Start reporting for `track`, counting from `start_frame`
    pub fn spawn(
        track: &TrackRef,
        start_frame: u64,
        interval: Duration,
        flags: Arc<TransportFlags>,
        clock: Arc<ProgressClock>,
        sink: Arc<dyn EventSink>,
    ) -> std::io::Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = bounded::<()>(1);
        let track = track.clone();
        let thread_cancel = Arc::clone(&cancel);

        clock.publish(Position {
            frame: start_frame,
            time_ms: track.frame_to_ms(start_frame),
        });

        let thread = thread::Builder::new()
            .name("cadence-progress".into())
            .spawn(move || {
                run(&track, start_frame, interval, &thread_cancel, &flags, &clock, sink.as_ref());
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            cancel,
            done,
            thread: Some(thread),
        })
    }

    /// Cancel the loop and join it, waiting at most `timeout`
    ///
    /// A thread that does not exit in time is detached; it will still stop
    /// at its next tick because the cancel flag stays set.
    pub fn stop(mut self, timeout: Duration) {
        self.cancel.store(true, Ordering::SeqCst);
        let Some(thread) = self.thread.take() else {
            return;
        };

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    warn!("Progress thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "Progress thread did not stop in time, detaching");
            }
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

fn run(
    track: &TrackRef,
    start_frame: u64,
    interval: Duration,
    cancel: &AtomicBool,
    flags: &TransportFlags,
    clock: &ProgressClock,
    sink: &dyn EventSink,
) {
    let offset_ms = track.frame_to_ms(start_frame);
    let started = Instant::now();
    debug!(track = %track.id, start_frame, "Progress reporting started");

    loop {
        // Checked every tick: a flag may flip between sleep and check
        if cancel.load(Ordering::SeqCst) || flags.progress_should_stop() {
            break;
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let position = position_at(track, start_frame, offset_ms + elapsed_ms, elapsed_ms);
        clock.publish(position);
        sink.notify(PlayerEvent::Progress {
            frame: position.frame,
            time_ms: position.time_ms,
        });

        thread::sleep(interval);
    }

    debug!(track = %track.id, "Progress reporting stopped");
}

/// Position `time_ms` into the track, clamped to its end when known
fn position_at(track: &TrackRef, start_frame: u64, time_ms: u64, elapsed_ms: u64) -> Position {
    let mut frame = if track.frame_rate() > 0.0 {
        track.ms_to_frame(time_ms)
    } else {
        start_frame
    };
    let mut time_ms = if track.frame_rate() > 0.0 {
        time_ms
    } else {
        elapsed_ms
    };

    if track.frame_count > 0 && frame > track.frame_count {
        frame = track.frame_count;
        time_ms = track.duration_ms();
    }

    Position { frame, time_ms }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_channel;
    use cadence_core::HandleId;

    fn track() -> TrackRef {
        // 38.28 frames per second
        TrackRef::new("t", "Song", "mem://t").with_timing(Duration::from_secs(200), 7_656)
    }

    #[test]
    fn position_is_clamped_to_track_end() {
        let t = track();
        let end = position_at(&t, 0, 500_000, 500_000);
        assert_eq!(end.frame, 7_656);
        assert_eq!(end.time_ms, 200_000);
    }

    #[test]
    fn position_counts_from_resume_offset() {
        let t = track();
        let p = position_at(&t, 0, 10_000, 10_000);
        assert_eq!(p.frame, 383);
    }

    #[test]
    fn emits_progress_until_cancelled() {
        let flags = Arc::new(TransportFlags::default());
        flags.set_active(HandleId::next());
        let clock = Arc::new(ProgressClock::default());
        let (tx, rx) = event_channel();

        let reporter = ProgressReporter::spawn(
            &track(),
            383,
            Duration::from_millis(5),
            Arc::clone(&flags),
            Arc::clone(&clock),
            Arc::new(tx),
        )
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        match first {
            PlayerEvent::Progress { frame, .. } => assert!(frame >= 383),
            other => panic!("unexpected event {other:?}"),
        }

        reporter.stop(Duration::from_secs(1));
        assert!(clock.position().frame >= 383);
    }

    #[test]
    fn exits_when_paused() {
        let flags = Arc::new(TransportFlags::default());
        flags.set_active(HandleId::next());
        let (tx, rx) = event_channel();

        let reporter = ProgressReporter::spawn(
            &track(),
            0,
            Duration::from_millis(5),
            Arc::clone(&flags),
            Arc::new(ProgressClock::default()),
            Arc::new(tx),
        )
        .unwrap();

        flags.is_paused.store(true, Ordering::SeqCst);
        reporter.stop(Duration::from_secs(1));

        // Drain whatever was sent before the pause; nothing arrives afterwards
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
    }
}

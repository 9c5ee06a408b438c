//! Playback controller - core orchestration
//!
//! Owns the playback state, runs transport operations, applies the ad policy
//! before every load and owns the two per-session threads (render and
//! progress).
//!
//! Lock order is `transition` → `state` → `session`. Threads are never
//! joined while `state` or `session` is held. Device callbacks run on the
//! render thread and never block on the transition lock: a finished
//! callback that needs a transition parks it, and whoever holds the lock
//! runs it on release. Parked work whose handle is no longer active is
//! dropped.

use crate::{
    config::PlaybackConfig,
    cursor::{self, Direction, Step},
    error::{PlaybackError, Result},
    events::{EventSink, PlayerEvent},
    gate::ResumeGate,
    progress::{ProgressClock, ProgressReporter},
    shuffle,
    transport::TransportFlags,
    types::{PlaybackState, Position, RepeatMode},
    volume,
};
use cadence_core::{
    AdvertisementPolicy, AudioSource, CadenceError, DeviceHandle, HandleId, LibraryBackend,
    OutputDevice, PlaybackListener, PlaylistRef, TrackRef, UserId,
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// External collaborators of a controller
pub struct Collaborators {
    pub source: Arc<dyn AudioSource>,
    pub device: Arc<dyn OutputDevice>,
    pub ads: Arc<dyn AdvertisementPolicy>,
    pub library: Arc<dyn LibraryBackend>,
    pub events: Arc<dyn EventSink>,
}

/// Playback controller
///
/// Public methods run on the caller's thread and return once the transition
/// is wired up; rendering happens on a controller-owned thread. Dropping the
/// controller tears down the active session.
pub struct PlaybackController {
    inner: Arc<Inner>,
}

struct Inner {
    me: Weak<Inner>,
    user: UserId,
    config: PlaybackConfig,
    source: Arc<dyn AudioSource>,
    device: Arc<dyn OutputDevice>,
    ads: Arc<dyn AdvertisementPolicy>,
    library: Arc<dyn LibraryBackend>,
    events: Arc<dyn EventSink>,
    state: Mutex<State>,
    session: Mutex<Session>,
    flags: Arc<TransportFlags>,
    clock: Arc<ProgressClock>,
    transition: Mutex<()>,
    /// Finished callback waiting for the transition lock
    parked_finish: Mutex<Option<FinishedAt>>,
}

#[derive(Debug, Clone, Copy)]
struct FinishedAt {
    handle: HandleId,
    frame: u64,
}

/// Caller hold on `transition`; runs parked callback work once released
struct TransitionGuard<'a> {
    inner: &'a Inner,
    guard: Option<MutexGuard<'a, ()>>,
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.inner.run_parked_finish();
    }
}

#[derive(Debug, Clone)]
struct State {
    current_track: Option<TrackRef>,
    current_playlist: Option<PlaylistRef>,
    current_index: usize,
    current_frame: u64,
    current_time_ms: u64,
    repeat_mode: RepeatMode,
    having_ad: bool,
    /// Track an ad is standing in for
    pending_track: Option<TrackRef>,
    volume_gain_db: f32,
    /// Stored gain not yet pushed to a gain control
    gain_pending: bool,
}

#[derive(Default)]
struct Session {
    handle: Option<Arc<dyn DeviceHandle>>,
    render: Option<JoinHandle<()>>,
    progress: Option<ProgressReporter>,
    gate: Option<Arc<ResumeGate>>,
}

impl Session {
    fn is_empty(&self) -> bool {
        self.handle.is_none() && self.render.is_none() && self.progress.is_none()
    }
}

/// Forwards device callbacks without keeping the controller alive
struct CallbackTarget(Weak<Inner>);

impl PlaybackListener for CallbackTarget {
    fn on_started(&self, handle: HandleId) {
        if let Some(inner) = self.0.upgrade() {
            inner.on_started(handle);
        }
    }

    fn on_finished(&self, handle: HandleId, frame: u64) {
        if let Some(inner) = self.0.upgrade() {
            inner.on_finished(handle, frame);
        }
    }
}

enum SkipTarget {
    Track(TrackRef),
    FallbackPlaylist,
}

impl PlaybackController {
    /// Create an idle controller for the user named in `config`
    pub fn new(config: PlaybackConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let Collaborators {
            source,
            device,
            ads,
            library,
            events,
        } = collaborators;

        let state = State {
            current_track: None,
            current_playlist: None,
            current_index: 0,
            current_frame: 0,
            current_time_ms: 0,
            repeat_mode: config.initial_repeat,
            having_ad: false,
            pending_track: None,
            volume_gain_db: volume::clamp_gain_db(config.initial_gain_db),
            gain_pending: true,
        };

        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            user: UserId::new(config.user_id.clone()),
            config,
            source,
            device,
            ads,
            library,
            events,
            state: Mutex::new(state),
            session: Mutex::new(Session::default()),
            flags: Arc::new(TransportFlags::default()),
            clock: Arc::new(ProgressClock::default()),
            transition: Mutex::new(()),
            parked_finish: Mutex::new(None),
        });

        info!(user = %inner.user, "Playback controller ready");
        Ok(Self { inner })
    }

    /// Load `track` (or nothing) and start playing it
    ///
    /// The ad policy is consulted first and may substitute an ad; the
    /// requested track then plays once the ad has finished.
    pub fn load(&self, track: Option<TrackRef>) -> Result<()> {
        let _transition = self.inner.lock_transition();
        self.inner.load_locked(track)
    }

    /// Start or resume the current track
    ///
    /// No-op while already rendering. Resumes from the pause checkpoint
    /// when paused, otherwise starts from the beginning.
    pub fn play(&self) -> Result<()> {
        let _transition = self.inner.lock_transition();
        self.inner.play_locked()
    }

    /// Pause at the frame the device reports stopping at
    ///
    /// No-op while an ad plays or when nothing is rendering.
    pub fn pause(&self) {
        let _transition = self.inner.lock_transition();
        let inner = &self.inner;

        if inner.state.lock().having_ad {
            debug!("Ignoring pause during ad");
            return;
        }
        if !inner.is_rendering() {
            return;
        }

        inner.flags.is_paused.store(true, Ordering::SeqCst);
        inner.emit(PlayerEvent::PlaybackPaused);
        inner.teardown();
    }

    /// Tear down the active session
    ///
    /// Safe to call repeatedly. Stopping an idle controller resets the
    /// listener's ad counter.
    pub fn stop(&self) {
        let _transition = self.inner.lock_transition();
        if !self.inner.teardown() {
            debug!(user = %self.inner.user, "Stop while idle, resetting ad counter");
            self.inner.ads.reset_counter(&self.inner.user);
        }
    }

    /// Skip forward
    pub fn next(&self) -> Result<()> {
        self.inner.skip(Direction::Next)
    }

    /// Skip backward
    pub fn prev(&self) -> Result<()> {
        self.inner.skip(Direction::Previous)
    }

    /// Jump to a random other track of the active playlist
    pub fn shuffle(&self) -> Result<()> {
        let _transition = self.inner.lock_transition();
        let inner = &self.inner;

        let target = {
            let mut guard = inner.state.lock();
            let state = &mut *guard;
            if state.having_ad {
                debug!("Ignoring shuffle during ad");
                return Ok(());
            }
            let Some(playlist) = state.current_playlist.as_ref() else {
                return Ok(());
            };
            let Some(index) = shuffle::pick_other_index(playlist.len(), state.current_index)
            else {
                return Ok(());
            };
            let track = playlist.tracks[index].clone();
            state.current_index = index;
            track
        };

        inner.flags.pressed_shuffle.store(true, Ordering::SeqCst);
        inner.load_locked(Some(target))
    }

    /// Jump back by the configured replay step (five seconds by default)
    pub fn replay_five_seconds(&self) -> Result<()> {
        let _transition = self.inner.lock_transition();
        let inner = &self.inner;

        let base_ms = {
            let state = inner.state.lock();
            if state.having_ad || state.current_track.is_none() {
                return Ok(());
            }
            inner.live_time_ms(&state)
        };

        inner.reposition_locked(base_ms.saturating_sub(inner.config.replay_step_ms))
    }

    /// Seek to `position` from the start of the current track
    pub fn seek(&self, position: Duration) -> Result<()> {
        let _transition = self.inner.lock_transition();
        let inner = &self.inner;

        let target_ms = {
            let state = inner.state.lock();
            if state.having_ad {
                debug!("Ignoring seek during ad");
                return Ok(());
            }
            let Some(track) = state.current_track.as_ref() else {
                return Err(PlaybackError::NoTrackLoaded);
            };
            let ms = u64::try_from(position.as_millis()).unwrap_or(u64::MAX);
            if track.duration.is_zero() {
                ms
            } else {
                ms.min(track.duration_ms())
            }
        };

        inner.reposition_locked(target_ms)
    }

    /// Seek to a fraction (0.0 - 1.0) of the current track, as a UI slider does
    pub fn seek_to_fraction(&self, fraction: f64) -> Result<()> {
        let duration = {
            let state = self.inner.state.lock();
            state
                .current_track
                .as_ref()
                .map(|t| t.duration)
                .ok_or(PlaybackError::NoTrackLoaded)?
        };
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.seek(duration.mul_f64(fraction))
    }

    /// Store a gain in dB (clamped to [-40, 40]) and apply it if possible
    ///
    /// Returns the stored value.
    pub fn set_volume(&self, gain_db: f32) -> f32 {
        let inner = &self.inner;
        let stored = volume::clamp_gain_db(gain_db);
        {
            let mut state = inner.state.lock();
            state.volume_gain_db = stored;
            state.gain_pending = true;
        }
        inner.emit(PlayerEvent::VolumeChanged(stored));

        let handle = inner.session.lock().handle.clone();
        if let Some(handle) = handle {
            inner.apply_gain(handle.as_ref());
        }
        stored
    }

    /// NoRepeat → RepeatAll → RepeatOne → NoRepeat
    ///
    /// Rejected while an ad plays. Returns the mode in effect afterwards.
    pub fn cycle_repeat_mode(&self) -> RepeatMode {
        let mode = {
            let mut state = self.inner.state.lock();
            if state.having_ad {
                debug!("Ignoring repeat change during ad");
                return state.repeat_mode;
            }
            state.repeat_mode = state.repeat_mode.cycle();
            state.repeat_mode
        };
        self.inner.emit(PlayerEvent::RepeatModeChanged(mode));
        mode
    }

    /// Make `playlist` the active playlist without changing the track
    pub fn set_playlist(&self, playlist: Option<PlaylistRef>) {
        let _transition = self.inner.lock_transition();
        self.inner.activate_playlist(playlist);
    }

    /// Activate `playlist` and load the track at `index`
    ///
    /// An empty playlist or an out-of-range index is ignored.
    pub fn play_playlist(&self, playlist: PlaylistRef, index: usize) -> Result<()> {
        let _transition = self.inner.lock_transition();
        let inner = &self.inner;

        if inner.state.lock().having_ad {
            debug!("Ignoring playlist change during ad");
            return Ok(());
        }
        let Some(track) = playlist.get(index).cloned() else {
            debug!(playlist = %playlist.id, index, "Ignoring out-of-range playlist index");
            return Ok(());
        };

        inner.activate_playlist(Some(playlist));
        inner.state.lock().current_index = index;
        inner.load_locked(Some(track))
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> PlaybackState {
        let inner = &self.inner;
        let state = inner.state.lock();
        let flags = &inner.flags;
        PlaybackState {
            current_track: state.current_track.clone(),
            current_playlist: state.current_playlist.clone(),
            current_index: state.current_index,
            current_frame: state.current_frame,
            current_time_ms: state.current_time_ms,
            is_paused: flags.is_paused.load(Ordering::SeqCst),
            song_finished: flags.song_finished.load(Ordering::SeqCst),
            pressed_next: flags.pressed_next.load(Ordering::SeqCst),
            pressed_prev: flags.pressed_prev.load(Ordering::SeqCst),
            pressed_shuffle: flags.pressed_shuffle.load(Ordering::SeqCst),
            pressed_replay: flags.pressed_replay.load(Ordering::SeqCst),
            repeat_mode: state.repeat_mode,
            having_ad: state.having_ad,
            volume_gain_db: state.volume_gain_db,
        }
    }

    /// Live position while rendering, the checkpoint otherwise
    pub fn position(&self) -> Position {
        let inner = &self.inner;
        if inner.is_rendering() {
            inner.clock.position()
        } else {
            let state = inner.state.lock();
            Position {
                frame: state.current_frame,
                time_ms: state.current_time_ms,
            }
        }
    }

    /// Whether an ad currently blocks navigation
    pub fn is_ad_locked(&self) -> bool {
        self.inner.state.lock().having_ad
    }

    pub fn user(&self) -> &UserId {
        &self.inner.user
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        let _transition = self.inner.lock_transition();
        self.inner.teardown();
    }
}

impl Inner {
    fn lock_transition(&self) -> TransitionGuard<'_> {
        TransitionGuard {
            inner: self,
            guard: Some(self.transition.lock()),
        }
    }

    fn emit(&self, event: PlayerEvent) {
        self.events.notify(event);
    }

    fn is_rendering(&self) -> bool {
        self.flags.has_active()
            && !self.flags.song_finished.load(Ordering::SeqCst)
            && !self.flags.is_paused.load(Ordering::SeqCst)
    }

    fn live_time_ms(&self, state: &State) -> u64 {
        if self.is_rendering() {
            self.clock.position().time_ms
        } else {
            state.current_time_ms
        }
    }

    fn activate_playlist(&self, playlist: Option<PlaylistRef>) {
        {
            let mut state = self.state.lock();
            state.current_index = match (&playlist, &state.current_track) {
                (Some(p), Some(t)) => p.index_of(&t.id).unwrap_or(0),
                _ => 0,
            };
            state.current_playlist = playlist.clone();
        }
        self.emit(PlayerEvent::PlaylistLoaded(playlist));
    }

    // ===== Transitions (caller holds `transition`) =====

    fn load_locked(&self, track: Option<TrackRef>) -> Result<()> {
        let before = self.state.lock().clone();

        self.reset_checkpoint();
        self.teardown();
        self.flags.is_paused.store(false, Ordering::SeqCst);
        self.flags.song_finished.store(false, Ordering::SeqCst);

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            thread::sleep(settle);
        }

        let resolved = self.resolve_ad(track);

        let Some(track) = resolved else {
            debug!("Loaded nothing, playback stopped");
            return Ok(());
        };

        let mode = {
            let mut state = self.state.lock();
            if let Some(index) = resolve_index(&state, &track) {
                state.current_index = index;
            }
            if state.repeat_mode == RepeatMode::RepeatOne {
                state.repeat_mode = RepeatMode::RepeatAll;
            }
            state.repeat_mode
        };

        info!(track = %track.id, title = %track.title, ad = track.is_advertisement, "Loaded track");
        self.emit(PlayerEvent::RepeatModeChanged(mode));
        self.emit(PlayerEvent::SongLoaded(track));

        self.start_session()
            .or_else(|err| self.fail_transition(before, err))
    }

    /// Apply the ad policy and make the resulting track current
    fn resolve_ad(&self, requested: Option<TrackRef>) -> Option<TrackRef> {
        let ad = match &requested {
            Some(track) if !track.is_advertisement && self.ads.should_show_ad(&self.user) => {
                let ad = self.ads.pick_ad();
                if ad.is_none() {
                    warn!("Ad due but the catalog is empty");
                }
                ad
            }
            _ => None,
        };

        if let Some(mut ad) = ad {
            ad.is_advertisement = true;
            {
                let mut state = self.state.lock();
                state.pending_track = requested;
                state.having_ad = true;
                state.current_track = Some(ad.clone());
            }
            info!(ad = %ad.id, "Inserting ad");
            self.emit(PlayerEvent::AdOn);
            return Some(ad);
        }

        {
            let mut state = self.state.lock();
            state.pending_track = None;
            state.having_ad = false;
            state.current_track = requested.clone();
        }
        self.emit(PlayerEvent::AdOff);

        if let Some(track) = requested.as_ref().filter(|t| !t.is_advertisement) {
            if let Err(err) = self.library.record_play(&self.user, track) {
                warn!(track = %track.id, error = %err, "Failed to record play");
            }
        }
        requested
    }

    fn play_locked(&self) -> Result<()> {
        if self.state.lock().current_track.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        if self.is_rendering() {
            return Ok(());
        }

        let before = self.state.lock().clone();
        // Finished or stopped sessions still hold their handle
        if !self.flags.is_paused.load(Ordering::SeqCst) {
            self.teardown();
            self.reset_checkpoint();
        }
        self.start_session()
            .or_else(|err| self.fail_transition(before, err))
    }

    /// Restart rendering at `time_ms` (replay and seek)
    fn reposition_locked(&self, time_ms: u64) -> Result<()> {
        let before = self.state.lock().clone();

        self.flags.pressed_replay.store(true, Ordering::SeqCst);
        self.teardown();

        {
            let mut state = self.state.lock();
            let frame = state
                .current_track
                .as_ref()
                .map(|t| t.ms_to_frame(time_ms))
                .unwrap_or(0);
            state.current_frame = frame;
            state.current_time_ms = time_ms;
        }
        debug!(time_ms, "Repositioning");

        self.start_session()
            .or_else(|err| self.fail_transition(before, err))
    }

    fn skip(&self, direction: Direction) -> Result<()> {
        let _transition = self.lock_transition();

        let (target, promoted) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.having_ad {
                debug!(?direction, "Ignoring skip during ad");
                return Ok(());
            }

            let promoted = state.repeat_mode == RepeatMode::RepeatOne;
            if promoted {
                state.repeat_mode = RepeatMode::RepeatAll;
            }

            let target = match state.current_playlist.as_ref() {
                None => state.current_track.clone().map(SkipTarget::Track),
                Some(playlist) => {
                    match cursor::advance(playlist, state.current_index, direction, state.repeat_mode) {
                        Some(Step::To(index)) => {
                            let track = playlist.tracks[index].clone();
                            state.current_index = index;
                            Some(SkipTarget::Track(track))
                        }
                        Some(Step::NeedNewPlaylist) => Some(SkipTarget::FallbackPlaylist),
                        Some(Step::Finished) | None => None,
                    }
                }
            };
            (target, promoted)
        };

        if promoted {
            self.emit(PlayerEvent::RepeatModeChanged(RepeatMode::RepeatAll));
        }
        let Some(target) = target else {
            return Ok(());
        };

        match direction {
            Direction::Previous => self.flags.pressed_prev.store(true, Ordering::SeqCst),
            Direction::Next | Direction::Continue => {
                self.flags.pressed_next.store(true, Ordering::SeqCst);
            }
        }

        match target {
            SkipTarget::Track(track) => self.load_locked(Some(track)),
            SkipTarget::FallbackPlaylist => self.fallback_playlist(),
        }
    }

    /// Past the end of the last playlist without repeat: pick another
    /// playlist of the user, or stay on the current track
    fn fallback_playlist(&self) -> Result<()> {
        let current = self.state.lock().current_playlist.clone();

        let candidates = match self.library.fetch_user_playlists(&self.user) {
            Ok(playlists) => playlists,
            Err(err) => {
                warn!(error = %err, "Could not fetch playlists, staying on current track");
                Vec::new()
            }
        };
        let mut candidates: Vec<PlaylistRef> =
            candidates.into_iter().filter(|p| !p.is_empty()).collect();
        if candidates.len() > 1 {
            if let Some(current) = &current {
                candidates.retain(|p| p.id != current.id);
            }
        }

        match shuffle::pick_random(&candidates).cloned() {
            Some(playlist) => {
                info!(playlist = %playlist.id, "Continuing with another playlist");
                let first = playlist.tracks[0].clone();
                {
                    let mut state = self.state.lock();
                    state.current_playlist = Some(playlist.clone());
                    state.current_index = 0;
                }
                self.emit(PlayerEvent::PlaylistLoaded(Some(playlist)));
                self.load_locked(Some(first))
            }
            None => {
                let track = self.state.lock().current_track.clone();
                self.load_locked(track)
            }
        }
    }

    /// Open the current track and start the render and progress threads
    fn start_session(&self) -> Result<()> {
        let (track, start_frame, gain_db) = {
            let state = self.state.lock();
            let track = state
                .current_track
                .clone()
                .ok_or(PlaybackError::NoTrackLoaded)?;
            let resume = self.flags.is_paused.load(Ordering::SeqCst)
                || self.flags.pressed_replay.load(Ordering::SeqCst);
            (track, resume.then_some(state.current_frame), state.volume_gain_db)
        };

        let track = self.hydrate(track)?;

        let stream = self.source.fetch_bytes(&track.locator)?;
        let listener: Arc<dyn PlaybackListener> = Arc::new(CallbackTarget(self.me.clone()));
        let handle = self.device.open(stream, listener)?;
        let handle_id = handle.id();

        self.flags.is_paused.store(false, Ordering::SeqCst);
        self.flags.song_finished.store(false, Ordering::SeqCst);
        self.flags.pressed_replay.store(false, Ordering::SeqCst);
        self.flags.clear_navigation();
        self.flags.set_active(handle_id);

        self.apply_gain(handle.as_ref());
        self.emit(PlayerEvent::VisualizerToggled(true));

        let gate = Arc::new(ResumeGate::new());
        let render = {
            let handle = Arc::clone(&handle);
            let gate = Arc::clone(&gate);
            let me = self.me.clone();
            let wait = self.config.resume_wait_timeout();
            thread::Builder::new()
                .name("cadence-render".into())
                .spawn(move || run_render(handle.as_ref(), start_frame, &gate, wait, &me))
                .map_err(|err| {
                    self.flags.clear_active();
                    PlaybackError::DeviceInitFailure(format!("failed to spawn render thread: {err}"))
                })?
        };

        let progress = ProgressReporter::spawn(
            &track,
            start_frame.unwrap_or(0),
            self.config.progress_interval(),
            Arc::clone(&self.flags),
            Arc::clone(&self.clock),
            Arc::clone(&self.events),
        );
        let progress = match progress {
            Ok(progress) => Some(progress),
            Err(err) => {
                warn!(error = %err, "Failed to spawn progress thread");
                None
            }
        };

        {
            let mut session = self.session.lock();
            session.handle = Some(handle);
            session.render = Some(render);
            session.progress = progress;
            session.gate = Some(Arc::clone(&gate));
        }
        gate.open();

        debug!(track = %track.id, handle = %handle_id, ?start_frame, "Session started");
        Ok(())
    }

    /// Fill in duration and frame count when the track does not carry them
    fn hydrate(&self, track: TrackRef) -> Result<TrackRef> {
        if track.frame_count > 0 {
            return Ok(track);
        }

        let metadata = self.source.fetch_metadata(&track.locator)?;
        let hydrated = track.with_metadata(&metadata);
        debug!(
            track = %hydrated.id,
            frames = hydrated.frame_count,
            duration_ms = hydrated.duration_ms(),
            "Hydrated track metadata"
        );

        let mut state = self.state.lock();
        if state.current_track.as_ref().is_some_and(|t| t.id == hydrated.id) {
            state.current_track = Some(hydrated.clone());
        }
        Ok(hydrated)
    }

    /// Restore the pre-transition state with nothing playing
    fn fail_transition(&self, before: State, err: PlaybackError) -> Result<()> {
        error!(error = %err, "Playback transition failed");
        self.teardown();

        {
            let mut state = self.state.lock();
            *state = before;
            state.current_track = None;
            state.having_ad = false;
            state.pending_track = None;
            state.current_frame = 0;
            state.current_time_ms = 0;
        }
        self.flags.is_paused.store(false, Ordering::SeqCst);
        self.flags.song_finished.store(false, Ordering::SeqCst);
        self.flags.pressed_replay.store(false, Ordering::SeqCst);
        self.flags.clear_navigation();

        self.emit(PlayerEvent::LoadFailed {
            reason: err.to_string(),
        });
        Err(err)
    }

    fn reset_checkpoint(&self) {
        let mut state = self.state.lock();
        state.current_frame = 0;
        state.current_time_ms = 0;
    }

    /// Stop the active session and join its threads
    ///
    /// Returns `false` when there was nothing to tear down.
    fn teardown(&self) -> bool {
        let mut session = std::mem::take(&mut *self.session.lock());
        if session.is_empty() {
            return false;
        }

        self.flags.tearing_down.store(true, Ordering::SeqCst);

        if let Some(progress) = session.progress.take() {
            progress.stop(self.config.progress_join_timeout());
        }
        if let Some(gate) = session.gate.take() {
            gate.cancel();
        }
        if let Some(handle) = session.handle.take() {
            if !self.flags.song_finished.load(Ordering::SeqCst) {
                handle.stop();
            }
        }
        if let Some(render) = session.render.take() {
            if render.thread().id() == thread::current().id() {
                // A callback on the render thread is driving this transition
                debug!("Teardown on the render thread, not joining itself");
            } else if render.join().is_err() {
                error!("Render thread panicked");
            }
        }

        self.flags.clear_active();
        self.flags.tearing_down.store(false, Ordering::SeqCst);
        true
    }

    /// Push the stored gain to `handle`, or leave it pending
    fn apply_gain(&self, handle: &dyn DeviceHandle) {
        let db = self.state.lock().volume_gain_db;
        match handle.gain_control() {
            Some(control) => {
                let applied = volume::apply_gain(control.as_ref(), db);
                self.state.lock().gain_pending = false;
                debug!(stored_db = db, applied_db = applied, "Applied gain");
            }
            None => {
                self.state.lock().gain_pending = true;
                debug!(stored_db = db, "Gain control not attachable yet");
            }
        }
    }

    // ===== Device callbacks (render thread) =====

    fn on_started(&self, handle: HandleId) {
        if !self.flags.is_active(handle) {
            debug!(%handle, "Ignoring stale start callback");
            return;
        }

        self.flags.clear_navigation();
        self.flags.song_finished.store(false, Ordering::SeqCst);
        self.emit(PlayerEvent::PlaybackStarted);

        let delay = self.config.gain_reapply_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let current = self.session.lock().handle.clone();
        if let Some(current) = current.filter(|h| h.id() == handle) {
            self.apply_gain(current.as_ref());
        }
    }

    fn on_finished(&self, handle: HandleId, frame: u64) {
        if !self.flags.is_active(handle) {
            debug!(%handle, frame, "Ignoring stale finished callback");
            return;
        }
        let tearing_down = self.flags.tearing_down.load(Ordering::SeqCst);
        let ad_ended = !tearing_down && self.state.lock().having_ad;

        if !ad_ended {
            // 2. Pause checkpoint at the frame the device actually stopped at
            if self.flags.is_paused.load(Ordering::SeqCst) {
                let mut state = self.state.lock();
                let time_ms = state
                    .current_track
                    .as_ref()
                    .map(|t| t.frame_to_ms(frame))
                    .unwrap_or(0);
                state.current_frame = frame;
                state.current_time_ms = time_ms;
                debug!(frame, time_ms, "Pause checkpoint");
                return;
            }

            // 3. Replay or seek restarts the session itself
            if self.flags.pressed_replay.load(Ordering::SeqCst) {
                return;
            }

            // 4. Explicit navigation
            if self.flags.navigating() {
                self.ads.note_play(&self.user);
                return;
            }

            // 5. Caller-initiated stop
            if tearing_down {
                return;
            }
        }

        *self.parked_finish.lock() = Some(FinishedAt { handle, frame });
        self.run_parked_finish();
    }

    /// Run the parked finished callback if the transition lock is free
    ///
    /// A busy holder runs it from its guard on release.
    fn run_parked_finish(&self) {
        while self.parked_finish.lock().is_some() {
            let Some(_transition) = self.transition.try_lock() else {
                debug!("Caller is mid-transition, finished callback parked");
                return;
            };
            let parked = self.parked_finish.lock().take();
            if let Some(FinishedAt { handle, frame }) = parked {
                if let Err(err) = self.finish_locked(handle, frame) {
                    warn!(error = %err, "Automatic transition failed");
                }
            }
        }
    }

    /// Ad end and natural end, with `transition` held
    fn finish_locked(&self, handle: HandleId, frame: u64) -> Result<()> {
        if !self.flags.is_active(handle) || self.flags.tearing_down.load(Ordering::SeqCst) {
            debug!(%handle, frame, "Finished session was replaced, dropping callback");
            return Ok(());
        }

        // 1. The ad ended: play what it stood in for
        let pending = {
            let mut state = self.state.lock();
            if state.having_ad {
                state.having_ad = false;
                Some(state.pending_track.take())
            } else {
                None
            }
        };
        if let Some(pending) = pending {
            info!("Ad finished");
            self.ads.reset_counter(&self.user);
            return self.load_locked(pending);
        }

        let (track, playlist, index, repeat) = {
            let state = self.state.lock();
            (
                state.current_track.clone(),
                state.current_playlist.clone(),
                state.current_index,
                state.repeat_mode,
            )
        };
        let Some(track) = track else {
            return Ok(());
        };

        if !track.is_complete_at(frame, self.config.natural_end_ratio) {
            warn!(
                track = %track.id,
                frame,
                frame_count = track.frame_count,
                "Playback stopped before the end, not advancing"
            );
            return Ok(());
        }

        debug!(track = %track.id, frame, "Track ended");
        self.flags.song_finished.store(true, Ordering::SeqCst);
        self.emit(PlayerEvent::PlaybackPaused);
        self.ads.note_play(&self.user);

        match playlist {
            None => match repeat {
                RepeatMode::RepeatOne | RepeatMode::RepeatAll => self.restart_locked(),
                RepeatMode::NoRepeat => {
                    debug!("No playlist, playback finished");
                    Ok(())
                }
            },
            Some(playlist) => {
                match cursor::advance(&playlist, index, Direction::Continue, repeat) {
                    Some(Step::To(next)) => {
                        self.state.lock().current_index = next;
                        self.load_locked(Some(playlist.tracks[next].clone()))
                    }
                    Some(Step::Finished | Step::NeedNewPlaylist) | None => {
                        debug!(playlist = %playlist.id, "Playlist finished");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Play the current track again from frame 0
    fn restart_locked(&self) -> Result<()> {
        let before = self.state.lock().clone();
        self.reset_checkpoint();
        self.teardown();
        self.start_session()
            .or_else(|err| self.fail_transition(before, err))
    }

    fn on_render_error(&self, handle: HandleId, err: &CadenceError) {
        if !self.flags.is_active(handle) || self.flags.tearing_down.load(Ordering::SeqCst) {
            debug!(%handle, error = %err, "Ignoring render error of stale handle");
            return;
        }
        error!(%handle, error = %err, "Rendering failed");
        self.flags.song_finished.store(true, Ordering::SeqCst);
        self.emit(PlayerEvent::LoadFailed {
            reason: err.to_string(),
        });
    }
}

/// Index of `track` in the active playlist, keeping the current index when
/// it already points at the track
fn resolve_index(state: &State, track: &TrackRef) -> Option<usize> {
    if state.having_ad {
        return None;
    }
    let playlist = state.current_playlist.as_ref()?;
    if playlist
        .get(state.current_index)
        .is_some_and(|t| t.id == track.id)
    {
        return Some(state.current_index);
    }
    playlist.index_of(&track.id)
}

/// Render thread body
///
/// Waits for the controller to finish storing the session so callbacks can
/// find their handle, then blocks in the device until rendering ends.
fn run_render(
    handle: &dyn DeviceHandle,
    start_frame: Option<u64>,
    gate: &ResumeGate,
    wait: Duration,
    controller: &Weak<Inner>,
) {
    if !gate.wait(wait) {
        debug!(handle = %handle.id(), "Session cancelled before playback started");
        return;
    }

    if let Err(err) = handle.play(start_frame) {
        if let Some(inner) = controller.upgrade() {
            inner.on_render_error(handle.id(), &err);
        }
    }
}

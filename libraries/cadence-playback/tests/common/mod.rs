//! Shared test doubles for controller tests
//!
//! The mock device renders nothing: a handle's `play` blocks until the test
//! either stops it through the controller or finishes it at a chosen frame.

#![allow(dead_code)]

use cadence_core::{
    AdvertisementPolicy, AudioSource, ByteStream, CadenceError, DeviceHandle, GainControl,
    HandleId, LibraryBackend, OutputDevice, PlaybackListener, PlaylistKind, PlaylistRef,
    TrackId, TrackMetadata, TrackRef, UserId,
};
use cadence_playback::{
    Collaborators, EventSink, PlaybackConfig, PlaybackController, PlayerEvent,
};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

pub type CoreResult<T> = cadence_core::Result<T>;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ===== Test Helpers =====

/// 200 s song with 7656 frames (38.28 frames per second, as MP3 at 44.1 kHz)
pub fn song(id: &str) -> TrackRef {
    TrackRef::new(id, format!("Song {id}"), format!("mem://{id}"))
        .with_artist("Test Artist")
        .with_timing(Duration::from_secs(200), 7_656)
}

/// 15 s ad with 574 frames
pub fn ad(id: &str) -> TrackRef {
    TrackRef::advertisement(id, format!("Ad {id}"), format!("mem://{id}"))
        .with_timing(Duration::from_secs(15), 574)
}

pub fn playlist(id: &str, track_ids: &[&str]) -> PlaylistRef {
    PlaylistRef::new(id, format!("Playlist {id}"), PlaylistKind::UserPlaylist)
        .with_tracks(track_ids.iter().map(|t| song(t)).collect())
}

pub fn test_config() -> PlaybackConfig {
    PlaybackConfig {
        user_id: "listener".to_string(),
        settle_delay_ms: 0,
        progress_interval_ms: 5,
        resume_wait_timeout_ms: 1_000,
        progress_join_timeout_ms: 500,
        gain_reapply_delay_ms: 0,
        ..PlaybackConfig::default()
    }
}

/// Poll `condition` until it holds or two seconds pass
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

// ===== Audio Source =====

#[derive(Default)]
pub struct MockSource {
    metadata: Mutex<HashMap<String, TrackMetadata>>,
    broken: Mutex<HashSet<String>>,
    pub byte_fetches: AtomicUsize,
    pub metadata_fetches: AtomicUsize,
}

impl MockSource {
    pub fn break_locator(&self, locator: &str) {
        self.broken.lock().insert(locator.to_string());
    }

    pub fn set_metadata(&self, locator: &str, metadata: TrackMetadata) {
        self.metadata.lock().insert(locator.to_string(), metadata);
    }
}

impl AudioSource for MockSource {
    fn fetch_bytes(&self, locator: &str) -> CoreResult<Box<dyn ByteStream>> {
        self.byte_fetches.fetch_add(1, Ordering::SeqCst);
        if self.broken.lock().contains(locator) {
            return Err(CadenceError::source_unavailable(locator, "404 Not Found"));
        }
        Ok(Box::new(Cursor::new(Vec::<u8>::new())))
    }

    fn fetch_metadata(&self, locator: &str) -> CoreResult<TrackMetadata> {
        self.metadata_fetches.fetch_add(1, Ordering::SeqCst);
        if self.broken.lock().contains(locator) {
            return Err(CadenceError::source_unavailable(locator, "404 Not Found"));
        }
        Ok(self
            .metadata
            .lock()
            .get(locator)
            .cloned()
            .unwrap_or(TrackMetadata {
                duration: Duration::from_secs(200),
                frame_count: 7_656,
                mime: Some("audio/mpeg".to_string()),
            }))
    }
}

// ===== Output Device =====

pub struct MockGain {
    db: Mutex<f32>,
    min: f32,
    max: f32,
}

impl MockGain {
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            db: Mutex::new(0.0),
            min,
            max,
        }
    }
}

impl GainControl for MockGain {
    fn min_db(&self) -> f32 {
        self.min
    }
    fn max_db(&self) -> f32 {
        self.max
    }
    fn gain_db(&self) -> f32 {
        *self.db.lock()
    }
    fn set_gain_db(&self, db: f32) {
        *self.db.lock() = db;
    }
}

#[derive(Default)]
struct HandleState {
    position: u64,
    start_frame: Option<Option<u64>>,
    stop_requested: bool,
    finish_at: Option<u64>,
    finished: bool,
    stop_calls: u32,
}

pub struct MockHandle {
    id: HandleId,
    listener: Arc<dyn PlaybackListener>,
    gain: Option<Arc<MockGain>>,
    state: Mutex<HandleState>,
    signal: Condvar,
}

impl MockHandle {
    /// Start frame passed to `play`, once playing (`Some(None)` = from 0)
    pub fn start_frame(&self) -> Option<Option<u64>> {
        self.state.lock().start_frame
    }

    pub fn wait_started(&self) -> bool {
        wait_until(|| self.start_frame().is_some())
    }

    /// Frame reported when the controller stops this handle
    pub fn set_position(&self, frame: u64) {
        self.state.lock().position = frame;
    }

    /// End rendering as if the decoder stopped at `frame`
    pub fn finish_at(&self, frame: u64) {
        let mut state = self.state.lock();
        state.finish_at = Some(frame);
        self.signal.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    pub fn stop_calls(&self) -> u32 {
        self.state.lock().stop_calls
    }

    pub fn gain(&self) -> Option<Arc<MockGain>> {
        self.gain.clone()
    }

    /// Invoke the finished callback directly, bypassing `play`
    pub fn fire_finished(&self, frame: u64) {
        self.listener.on_finished(self.id, frame);
    }
}

impl DeviceHandle for MockHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn play(&self, start_frame: Option<u64>) -> CoreResult<()> {
        {
            let mut state = self.state.lock();
            state.start_frame = Some(start_frame);
            state.position = start_frame.unwrap_or(0);
        }
        self.listener.on_started(self.id);

        let frame = {
            let mut state = self.state.lock();
            while !state.stop_requested && state.finish_at.is_none() {
                self.signal.wait(&mut state);
            }
            state.finish_at.unwrap_or(state.position)
        };

        self.listener.on_finished(self.id, frame);
        self.state.lock().finished = true;
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.stop_requested = true;
        state.stop_calls += 1;
        self.signal.notify_all();
    }

    fn gain_control(&self) -> Option<Arc<dyn GainControl>> {
        self.gain
            .clone()
            .map(|gain| gain as Arc<dyn GainControl>)
    }
}

pub struct MockDevice {
    handles: Mutex<Vec<Arc<MockHandle>>>,
    pub fail_open: AtomicBool,
    gain_range: Option<(f32, f32)>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_gain_range(Some((-40.0, 40.0)))
    }

    pub fn with_gain_range(gain_range: Option<(f32, f32)>) -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            fail_open: AtomicBool::new(false),
            gain_range,
        }
    }

    pub fn opened(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn handle(&self, index: usize) -> Arc<MockHandle> {
        Arc::clone(&self.handles.lock()[index])
    }

    pub fn latest(&self) -> Arc<MockHandle> {
        let handles = self.handles.lock();
        Arc::clone(handles.last().expect("no handle opened yet"))
    }

    /// Wait until `count` handles exist and the last one is playing
    pub fn wait_for_handle(&self, count: usize) -> Arc<MockHandle> {
        assert!(
            wait_until(|| self.opened() >= count),
            "expected {count} handles, got {}",
            self.opened()
        );
        let handle = self.latest();
        assert!(handle.wait_started(), "handle never started playing");
        handle
    }
}

impl OutputDevice for MockDevice {
    fn open(
        &self,
        _stream: Box<dyn ByteStream>,
        listener: Arc<dyn PlaybackListener>,
    ) -> CoreResult<Arc<dyn DeviceHandle>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(CadenceError::device_init("mock device refuses to open"));
        }
        let handle = Arc::new(MockHandle {
            id: HandleId::next(),
            listener,
            gain: self
                .gain_range
                .map(|(min, max)| Arc::new(MockGain::new(min, max))),
            state: Mutex::new(HandleState::default()),
            signal: Condvar::new(),
        });
        self.handles.lock().push(Arc::clone(&handle));
        Ok(handle)
    }
}

// ===== Advertisement Policy =====

#[derive(Default)]
pub struct MockAds {
    pub due: AtomicBool,
    pub catalog: Mutex<Vec<TrackRef>>,
    pub notes: AtomicUsize,
    pub resets: AtomicUsize,
}

impl MockAds {
    pub fn with_catalog(catalog: Vec<TrackRef>) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            ..Self::default()
        }
    }
}

impl AdvertisementPolicy for MockAds {
    fn should_show_ad(&self, _user: &UserId) -> bool {
        self.due.load(Ordering::SeqCst)
    }

    fn catalog(&self) -> Vec<TrackRef> {
        self.catalog.lock().clone()
    }

    fn note_play(&self, _user: &UserId) {
        self.notes.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_counter(&self, _user: &UserId) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.due.store(false, Ordering::SeqCst);
    }
}

// ===== Library Backend =====

#[derive(Default)]
pub struct MockLibrary {
    pub playlists: Mutex<Vec<PlaylistRef>>,
    pub fail: AtomicBool,
    pub recorded: Mutex<Vec<TrackId>>,
}

impl LibraryBackend for MockLibrary {
    fn fetch_user_playlists(&self, _user: &UserId) -> CoreResult<Vec<PlaylistRef>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CadenceError::backend("connection refused"));
        }
        Ok(self.playlists.lock().clone())
    }

    fn record_play(&self, _user: &UserId, track: &TrackRef) -> CoreResult<()> {
        self.recorded.lock().push(track.id.clone());
        Ok(())
    }
}

// ===== Event Sink =====

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PlayerEvent>>,
    /// Stall the notifying thread on `PlaylistLoaded`
    playlist_delay: Mutex<Option<Duration>>,
}

impl RecordingSink {
    pub fn stall_on_playlist_loaded(&self, delay: Duration) {
        *self.playlist_delay.lock() = Some(delay);
    }

    /// Everything except progress ticks
    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| !matches!(e, PlayerEvent::Progress { .. }))
            .cloned()
            .collect()
    }

    pub fn progress_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, PlayerEvent::Progress { .. }))
            .count()
    }

    pub fn count(&self, wanted: &PlayerEvent) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: PlayerEvent) {
        let stall = matches!(event, PlayerEvent::PlaylistLoaded(_));
        self.events.lock().push(event);
        if stall {
            if let Some(delay) = *self.playlist_delay.lock() {
                thread::sleep(delay);
            }
        }
    }
}

// ===== Harness =====

pub struct Harness {
    pub controller: PlaybackController,
    pub source: Arc<MockSource>,
    pub device: Arc<MockDevice>,
    pub ads: Arc<MockAds>,
    pub library: Arc<MockLibrary>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_device(MockDevice::new())
    }

    pub fn with_device(device: MockDevice) -> Self {
        init_tracing();
        let source = Arc::new(MockSource::default());
        let device = Arc::new(device);
        let ads = Arc::new(MockAds::with_catalog(vec![ad("ad-1")]));
        let library = Arc::new(MockLibrary::default());
        let sink = Arc::new(RecordingSink::default());

        let controller = PlaybackController::new(
            test_config(),
            Collaborators {
                source: Arc::clone(&source) as Arc<dyn AudioSource>,
                device: Arc::clone(&device) as Arc<dyn OutputDevice>,
                ads: Arc::clone(&ads) as Arc<dyn AdvertisementPolicy>,
                library: Arc::clone(&library) as Arc<dyn LibraryBackend>,
                events: Arc::clone(&sink) as Arc<dyn EventSink>,
            },
        )
        .expect("valid test config");

        Self {
            controller,
            source,
            device,
            ads,
            library,
            sink,
        }
    }

    pub fn current_id(&self) -> Option<String> {
        self.controller
            .snapshot()
            .current_track
            .map(|t| t.id.as_str().to_string())
    }
}

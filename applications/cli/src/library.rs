//! In-memory library for a single terminal session

use cadence_core::{LibraryBackend, PlaylistRef, Result, TrackId, TrackRef, UserId};
use parking_lot::Mutex;
use std::path::Path;

/// Playlists given on the command line plus a play history
#[derive(Debug, Default)]
pub struct SessionLibrary {
    playlists: Vec<PlaylistRef>,
    history: Mutex<Vec<TrackId>>,
}

impl SessionLibrary {
    pub fn new(playlists: Vec<PlaylistRef>) -> Self {
        Self {
            playlists,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Tracks recorded as played, oldest first
    pub fn history(&self) -> Vec<TrackId> {
        self.history.lock().clone()
    }
}

impl LibraryBackend for SessionLibrary {
    fn fetch_user_playlists(&self, _user: &UserId) -> Result<Vec<PlaylistRef>> {
        Ok(self.playlists.clone())
    }

    fn record_play(&self, user: &UserId, track: &TrackRef) -> Result<()> {
        tracing::debug!(%user, track = %track.id, "Recording play");
        self.history.lock().push(track.id.clone());
        Ok(())
    }
}

/// Display title for a locator: the file stem, or the locator itself
pub fn title_for(locator: &str) -> String {
    let trimmed = locator.trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(locator)
        .to_string()
}

/// Track for a locator; duration and frame count are probed on first play
pub fn track_for(locator: &str) -> TrackRef {
    TrackRef::new(locator, title_for(locator), locator)
}

/// Ad track for a locator
pub fn ad_for(locator: &str) -> TrackRef {
    TrackRef::advertisement(locator, title_for(locator), locator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::PlaylistKind;

    #[test]
    fn titles_come_from_file_stems() {
        assert_eq!(title_for("/music/Blue in Green.mp3"), "Blue in Green");
        assert_eq!(title_for("https://cdn.example.com/tracks/42.flac"), "42");
        assert_eq!(title_for("plain"), "plain");
    }

    #[test]
    fn records_history() {
        let library = SessionLibrary::new(vec![PlaylistRef::new(
            "queue",
            "Queue",
            PlaylistKind::Queue,
        )]);
        let user = UserId::new("local");

        library.record_play(&user, &track_for("/a.mp3")).unwrap();
        assert_eq!(library.history(), vec![TrackId::new("/a.mp3")]);
        assert_eq!(library.fetch_user_playlists(&user).unwrap().len(), 1);
    }

    #[test]
    fn ads_are_flagged() {
        assert!(ad_for("/ads/jingle.mp3").is_advertisement);
        assert!(!track_for("/a.mp3").is_advertisement);
    }
}

/// Playlist reference types
use serde::{Deserialize, Serialize};

use super::{PlaylistId, TrackId, TrackRef};

/// Where a playlist came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistKind {
    /// A playlist owned by the user
    UserPlaylist,
    /// An ad-hoc play queue
    Queue,
    /// Files picked from the local disk
    LocalFiles,
    /// Unclassified
    #[default]
    None,
}

/// Ordered list of tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistRef {
    pub id: PlaylistId,
    pub name: String,
    pub tracks: Vec<TrackRef>,
    pub kind: PlaylistKind,
}

impl PlaylistRef {
    pub fn new(id: impl Into<PlaylistId>, name: impl Into<String>, kind: PlaylistKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tracks: Vec::new(),
            kind,
        }
    }

    #[must_use]
    pub fn with_tracks(mut self, tracks: Vec<TrackRef>) -> Self {
        self.tracks = tracks;
        self
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackRef> {
        self.tracks.get(index)
    }

    /// Position of the first track with the given id
    pub fn index_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.tracks.len().checked_sub(1)
    }
}

//! Playlist cursor
//!
//! Pure index arithmetic over a playlist, a direction and a repeat mode.
//! No I/O and no state: the controller feeds in the current index and acts
//! on the returned [`Step`].

use crate::types::RepeatMode;
use cadence_core::PlaylistRef;

/// Why the cursor is moving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Explicit skip forward
    Next,
    /// Explicit skip backward
    Previous,
    /// The current track ended naturally
    Continue,
}

/// Where the cursor lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Play the track at this index of the same playlist
    To(usize),
    /// Skipped past the end without repeat: another playlist is needed
    NeedNewPlaylist,
    /// Reached the end without repeat: stop
    Finished,
}

impl Step {
    /// Target index, if the step stays within the playlist
    pub fn index(self) -> Option<usize> {
        match self {
            Self::To(index) => Some(index),
            Self::NeedNewPlaylist | Self::Finished => None,
        }
    }

    pub fn need_new_playlist(self) -> bool {
        self == Self::NeedNewPlaylist
    }
}

/// Compute the next cursor position
///
/// Returns `None` for an empty playlist. An out-of-range `index` is treated
/// as the last track. `RepeatOne` behaves like `RepeatAll` for explicit
/// skips and pins the track for `Continue`.
pub fn advance(
    playlist: &PlaylistRef,
    index: usize,
    direction: Direction,
    repeat: RepeatMode,
) -> Option<Step> {
    let last = playlist.last_index()?;
    let index = index.min(last);

    let step = match direction {
        Direction::Next => {
            if index < last {
                Step::To(index + 1)
            } else {
                match repeat {
                    RepeatMode::NoRepeat => Step::NeedNewPlaylist,
                    RepeatMode::RepeatAll | RepeatMode::RepeatOne => Step::To(0),
                }
            }
        }
        Direction::Previous => {
            if index > 0 {
                Step::To(index - 1)
            } else {
                match repeat {
                    RepeatMode::NoRepeat => Step::To(0),
                    RepeatMode::RepeatAll | RepeatMode::RepeatOne => Step::To(last),
                }
            }
        }
        Direction::Continue => match repeat {
            RepeatMode::RepeatOne => Step::To(index),
            RepeatMode::RepeatAll if index == last => Step::To(0),
            RepeatMode::NoRepeat if index == last => Step::Finished,
            RepeatMode::RepeatAll | RepeatMode::NoRepeat => Step::To(index + 1),
        },
    };

    Some(step)
}

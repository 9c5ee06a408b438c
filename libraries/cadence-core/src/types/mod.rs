//! Domain types shared by the engine and its collaborators

mod ids;
mod playlist;
mod track;

pub use ids::{HandleId, PlaylistId, TrackId, UserId};
pub use playlist::{PlaylistKind, PlaylistRef};
pub use track::{TrackMetadata, TrackRef};

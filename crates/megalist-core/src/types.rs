//! Core domain types for Megalist.

pub mod megalist;
pub mod playlist;
pub mod track;

pub use megalist::{Megalist, MegalistKind};
pub use playlist::{PlaylistDetails, PlaylistMetadata, PlaylistOwner};
pub use track::{is_local_uri, TrackId};

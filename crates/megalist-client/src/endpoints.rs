//! Web API endpoint implementations.

pub mod playlists;
pub mod tracks;

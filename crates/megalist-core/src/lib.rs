//! # megalist-core
//!
//! Core types, traits, and error handling for Megalist, a tool that merges
//! playlists into deduplicated derived playlists and keeps them in sync.

pub mod error;
pub mod service;
pub mod trackset;
pub mod types;

pub use error::{Error, HttpError, Result};
pub use service::{PlaylistService, MAX_BATCH_SIZE};
pub use types::*;

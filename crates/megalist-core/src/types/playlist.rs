//! Playlist metadata as reported by the external service.

use serde::{Deserialize, Serialize};

/// Metadata for a playlist on the external service.
///
/// Freshly created playlists may report `owner` and `track_count` as missing
/// until the service has finished propagating them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistMetadata {
    /// Playlist ID.
    pub id: String,
    /// Playlist name.
    pub name: String,
    /// Playlist description.
    pub description: Option<String>,
    /// Owner of the playlist.
    pub owner: Option<PlaylistOwner>,
    /// Number of tracks.
    pub track_count: Option<u32>,
    /// Version identifier of the track list.
    pub snapshot_id: Option<String>,
}

impl PlaylistMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            owner: None,
            track_count: None,
            snapshot_id: None,
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: PlaylistOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub const fn with_track_count(mut self, count: u32) -> Self {
        self.track_count = Some(count);
        self
    }

    /// Get the owner's ID if the service has populated it.
    pub fn owner_id(&self) -> Option<&str> {
        self.owner
            .as_ref()
            .map(|o| o.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Get subtitle text showing owner and track count.
    pub fn subtitle(&self) -> String {
        let mut parts = Vec::new();

        if let Some(owner) = &self.owner {
            parts.push(owner.display_name().to_string());
        }

        if let Some(count) = self.track_count {
            let tracks = if count == 1 { "track" } else { "tracks" };
            parts.push(format!("{count} {tracks}"));
        }

        parts.join(" \u{2022} ")
    }
}

/// Playlist owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistOwner {
    /// Owner user ID.
    pub id: String,
    /// Display name (if the user has set one).
    pub display_name: Option<String>,
}

impl PlaylistOwner {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Display name, falling back to the user ID.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Changes to a playlist's name and description. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PlaylistDetails {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: None,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

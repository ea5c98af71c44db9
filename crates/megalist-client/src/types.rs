//! Web API request bodies and raw response structures.

use serde::{Deserialize, Serialize};

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Opaque URL of the next page, `None` on the last one.
    pub next: Option<String>,
    pub total: Option<u32>,
}

/// Entry of a playlist's track listing. `track` is null for unavailable items.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaylistItem {
    pub track: Option<RawTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTrack {
    pub uri: Option<String>,
    #[serde(default)]
    pub is_local: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaylist {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<RawOwner>,
    pub tracks: Option<RawTracksRef>,
    pub snapshot_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOwner {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTracksRef {
    pub total: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: Option<String>,
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct RawErrorResponse {
    pub error: RawErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawErrorBody {
    pub status: Option<u16>,
    pub message: Option<String>,
}

/// Body for adding or replacing tracks.
#[derive(Debug, Clone, Serialize)]
pub struct UrisPayload<'a> {
    pub uris: &'a [String],
}

/// Body for removing tracks.
#[derive(Debug, Clone, Serialize)]
pub struct RemoveTracksPayload<'a> {
    pub tracks: Vec<UriRef<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UriRef<'a> {
    pub uri: &'a str,
}

impl<'a> RemoveTracksPayload<'a> {
    pub fn new(uris: &'a [String]) -> Self {
        Self {
            tracks: uris.iter().map(|uri| UriRef { uri }).collect(),
        }
    }
}

/// Body for creating a playlist.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistPayload<'a> {
    pub name: &'a str,
    pub public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

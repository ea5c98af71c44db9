//! Conversions from raw Web API responses to core types.

use megalist_core::{is_local_uri, PlaylistMetadata, PlaylistOwner, TrackId};

use crate::types::{RawErrorResponse, RawPage, RawPlaylist, RawPlaylistItem};

/// Playable track URIs on a page, in order. Null entries, entries without a
/// URI, and local files are skipped.
pub fn parse_track_page(page: &RawPage<RawPlaylistItem>) -> Vec<TrackId> {
    page.items
        .iter()
        .filter_map(|item| item.track.as_ref())
        .filter(|track| !track.is_local)
        .filter_map(|track| track.uri.as_deref())
        .filter(|uri| !uri.is_empty() && !is_local_uri(uri))
        .map(str::to_string)
        .collect()
}

/// Convert a raw playlist object.
pub fn parse_playlist(raw: &RawPlaylist) -> PlaylistMetadata {
    let owner = raw.owner.as_ref().and_then(|o| {
        let id = o.id.as_deref().filter(|id| !id.is_empty())?;
        let mut owner = PlaylistOwner::new(id);
        owner.display_name.clone_from(&o.display_name);
        Some(owner)
    });

    PlaylistMetadata {
        id: raw.id.clone(),
        name: raw.name.clone(),
        description: raw.description.clone().filter(|d| !d.is_empty()),
        owner,
        track_count: raw.tracks.as_ref().and_then(|t| t.total),
        snapshot_id: raw.snapshot_id.clone(),
    }
}

/// Pull the human-readable message out of an error body, falling back to
/// the raw text.
pub fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<RawErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.trim().to_string())
}

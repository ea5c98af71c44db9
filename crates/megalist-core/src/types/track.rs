//! Track identifiers.

/// Opaque, stable track URI in the external catalog (e.g. `spotify:track:…`).
///
/// Equality is exact string match. Order within a list matters, set
/// membership does not.
pub type TrackId = String;

/// URI prefix the service uses for local files, which cannot be added to
/// other playlists through the API.
pub const LOCAL_TRACK_PREFIX: &str = "spotify:local:";

/// Returns true if the URI refers to a local file rather than a catalog track.
pub fn is_local_uri(uri: &str) -> bool {
    uri.starts_with(LOCAL_TRACK_PREFIX)
}

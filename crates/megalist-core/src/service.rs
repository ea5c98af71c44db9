//! The playlist service seam between the engine and the external API.

use async_trait::async_trait;

use crate::{PlaylistDetails, PlaylistMetadata, Result, TrackId};

/// Hard limit on identifiers per track mutation call.
pub const MAX_BATCH_SIZE: usize = 100;

/// Operations the engine needs from the external playlist service.
///
/// Implementations own pagination and batching: `add_tracks` and
/// `remove_tracks` accept any number of identifiers and send them in
/// sequential batches of at most [`MAX_BATCH_SIZE`]. A failure on one batch
/// leaves earlier batches applied. Nothing is retried.
#[async_trait]
pub trait PlaylistService: Send + Sync {
    /// Every playable track in the playlist, in playlist order.
    async fn list_all_tracks(&self, playlist_id: &str) -> Result<Vec<TrackId>>;

    /// Append tracks to the end of the playlist.
    async fn add_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()>;

    /// Remove every occurrence of each identifier.
    async fn remove_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()>;

    /// Overwrite the whole track list.
    async fn replace_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()>;

    async fn get_metadata(&self, playlist_id: &str) -> Result<PlaylistMetadata>;

    /// Create an empty playlist. The returned metadata may be incomplete.
    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<PlaylistMetadata>;

    async fn update_metadata(&self, playlist_id: &str, details: &PlaylistDetails) -> Result<()>;

    /// Stop following (the service's notion of deleting) a playlist.
    async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()>;

    /// Playlists in the current user's library.
    async fn list_user_playlists(&self) -> Result<Vec<PlaylistMetadata>>;

    /// ID of the user the credential belongs to.
    async fn current_user_id(&self) -> Result<String>;
}

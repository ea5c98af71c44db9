//! [`PlaylistService`] implementation backed by the Web API.

use async_trait::async_trait;
use megalist_core::{PlaylistDetails, PlaylistMetadata, PlaylistService, Result, TrackId};

use crate::PlaylistClient;

#[async_trait]
impl PlaylistService for PlaylistClient {
    async fn list_all_tracks(&self, playlist_id: &str) -> Result<Vec<TrackId>> {
        Self::list_all_tracks(self, playlist_id).await
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        Self::add_tracks(self, playlist_id, track_ids).await
    }

    async fn remove_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        Self::remove_tracks(self, playlist_id, track_ids).await
    }

    async fn replace_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        Self::replace_tracks(self, playlist_id, track_ids).await
    }

    async fn get_metadata(&self, playlist_id: &str) -> Result<PlaylistMetadata> {
        Self::get_metadata(self, playlist_id).await
    }

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<PlaylistMetadata> {
        Self::create_playlist(self, owner_id, name, description).await
    }

    async fn update_metadata(&self, playlist_id: &str, details: &PlaylistDetails) -> Result<()> {
        Self::update_metadata(self, playlist_id, details).await
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()> {
        Self::unfollow_playlist(self, playlist_id).await
    }

    async fn list_user_playlists(&self) -> Result<Vec<PlaylistMetadata>> {
        Self::list_user_playlists(self).await
    }

    async fn current_user_id(&self) -> Result<String> {
        Self::current_user_id(self).await
    }
}

//! Playlist metadata, creation, and library endpoints.

use megalist_core::{Error, HttpError, PlaylistDetails, PlaylistMetadata, Result};
use reqwest::Method;
use tracing::{debug, info};
use url::Url;

use crate::{
    client::decode,
    parser::parse_playlist,
    types::{CreatePlaylistPayload, RawPage, RawPlaylist, RawUser},
    PlaylistClient,
};

const METADATA_FIELDS: &str =
    "id,name,description,owner(id,display_name),tracks(total),snapshot_id";

/// Page size for the user's library listing (the service caps it at 50).
const LIBRARY_PAGE_SIZE: usize = 50;

impl PlaylistClient {
    /// Get playlist metadata.
    pub async fn get_metadata(&self, playlist_id: &str) -> Result<PlaylistMetadata> {
        let mut url = self.url(&["playlists", playlist_id])?;
        url.query_pairs_mut().append_pair("fields", METADATA_FIELDS);

        let raw: RawPlaylist = self.get(url).await?;
        Ok(parse_playlist(&raw))
    }

    /// Create a private playlist for `owner_id`.
    pub async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<PlaylistMetadata> {
        let url = self.url(&["users", owner_id, "playlists"])?;
        let payload = CreatePlaylistPayload {
            name,
            public: false,
            description,
        };

        let bytes = self.send_json(Method::POST, url, &payload).await?;
        let raw: RawPlaylist = decode(&bytes)?;

        info!("Created playlist {} ({name})", raw.id);
        Ok(parse_playlist(&raw))
    }

    /// Change a playlist's name and/or description.
    pub async fn update_metadata(
        &self,
        playlist_id: &str,
        details: &PlaylistDetails,
    ) -> Result<()> {
        if details.is_empty() {
            return Ok(());
        }

        let url = self.url(&["playlists", playlist_id])?;
        self.send_json(Method::PUT, url, details).await?;
        debug!("Updated details of {playlist_id}");
        Ok(())
    }

    /// Unfollow a playlist, removing it from the user's library.
    pub async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()> {
        let url = self.url(&["playlists", playlist_id, "followers"])?;
        self.send_empty(Method::DELETE, url).await?;
        info!("Unfollowed playlist {playlist_id}");
        Ok(())
    }

    /// List every playlist in the current user's library.
    pub async fn list_user_playlists(&self) -> Result<Vec<PlaylistMetadata>> {
        let mut url = self.url(&["me", "playlists"])?;
        url.query_pairs_mut()
            .append_pair("limit", &LIBRARY_PAGE_SIZE.to_string());

        let mut playlists = Vec::new();
        let mut next = Some(url);

        while let Some(page_url) = next.take() {
            let page: RawPage<Option<RawPlaylist>> = self.get(page_url).await?;
            playlists.extend(page.items.iter().flatten().map(parse_playlist));

            next = page
                .next
                .as_deref()
                .map(Url::parse)
                .transpose()
                .map_err(|e| Error::Http(HttpError::InvalidUrl(e.to_string())))?;
        }

        Ok(playlists)
    }

    /// ID of the user the credential belongs to.
    pub async fn current_user_id(&self) -> Result<String> {
        let url = self.url(&["me"])?;
        let user: RawUser = self.get(url).await?;
        debug!(
            "Authenticated as {} ({})",
            user.id,
            user.display_name.as_deref().unwrap_or("-")
        );
        Ok(user.id)
    }
}

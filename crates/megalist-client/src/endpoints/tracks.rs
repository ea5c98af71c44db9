//! Playlist track listing and mutation endpoints.

use megalist_core::{Error, HttpError, Result, TrackId, MAX_BATCH_SIZE};
use reqwest::Method;
use tracing::debug;
use url::Url;

use crate::{
    client::decode,
    parser::parse_track_page,
    types::{RawPage, RawPlaylistItem, RemoveTracksPayload, SnapshotResponse, UrisPayload},
    PlaylistClient,
};

/// Only the fields the track listing needs.
const TRACK_FIELDS: &str = "items(track(uri,is_local)),next,total";

impl PlaylistClient {
    /// Get every playable track in a playlist, following pagination until
    /// the service reports no next page.
    pub async fn list_all_tracks(&self, playlist_id: &str) -> Result<Vec<TrackId>> {
        let mut url = self.url(&["playlists", playlist_id, "tracks"])?;
        url.query_pairs_mut()
            .append_pair("limit", &self.context.page_size.to_string())
            .append_pair("fields", TRACK_FIELDS);

        let mut tracks = Vec::new();
        let mut next = Some(url);
        let mut pages = 0usize;

        while let Some(page_url) = next.take() {
            let page: RawPage<RawPlaylistItem> = self.get(page_url).await?;
            tracks.extend(parse_track_page(&page));
            pages += 1;

            next = page
                .next
                .as_deref()
                .map(Url::parse)
                .transpose()
                .map_err(|e| Error::Http(HttpError::InvalidUrl(e.to_string())))?;
        }

        debug!(
            "Listed {} tracks from {playlist_id} in {pages} page(s)",
            tracks.len()
        );
        Ok(tracks)
    }

    /// Append tracks in sequential batches of at most 100. A failed batch
    /// stops the call; earlier batches stay applied.
    pub async fn add_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        for (index, batch) in track_ids.chunks(MAX_BATCH_SIZE).enumerate() {
            debug!(
                "Adding batch {index} ({} tracks) to {playlist_id}",
                batch.len()
            );
            let url = self.url(&["playlists", playlist_id, "tracks"])?;
            let bytes = self
                .send_json(Method::POST, url, &UrisPayload { uris: batch })
                .await?;
            let _: SnapshotResponse = decode(&bytes)?;
        }
        Ok(())
    }

    /// Remove every occurrence of each track, in batches of at most 100.
    pub async fn remove_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        for (index, batch) in track_ids.chunks(MAX_BATCH_SIZE).enumerate() {
            debug!(
                "Removing batch {index} ({} tracks) from {playlist_id}",
                batch.len()
            );
            let url = self.url(&["playlists", playlist_id, "tracks"])?;
            let bytes = self
                .send_json(Method::DELETE, url, &RemoveTracksPayload::new(batch))
                .await?;
            let _: SnapshotResponse = decode(&bytes)?;
        }
        Ok(())
    }

    /// Overwrite the playlist's tracks. The first 100 replace the current
    /// list in one call (an empty list clears it); the rest are appended.
    pub async fn replace_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        let split = track_ids.len().min(MAX_BATCH_SIZE);
        let (head, tail) = track_ids.split_at(split);

        debug!(
            "Replacing tracks of {playlist_id} ({} tracks)",
            track_ids.len()
        );
        let url = self.url(&["playlists", playlist_id, "tracks"])?;
        let bytes = self
            .send_json(Method::PUT, url, &UrisPayload { uris: head })
            .await?;
        let _: SnapshotResponse = decode(&bytes)?;

        self.add_tracks(playlist_id, tail).await
    }
}

//! In-memory playlist service for tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use megalist_core::{
    Error, HttpError, PlaylistDetails, PlaylistMetadata, PlaylistOwner, PlaylistService, Result,
    TrackId, MAX_BATCH_SIZE,
};
use parking_lot::Mutex;

pub const USER_ID: &str = "me";

#[derive(Debug, Default)]
struct FakePlaylist {
    name: String,
    tracks: Vec<TrackId>,
    /// Metadata calls left before owner and track count show up.
    pending_metadata_polls: usize,
}

#[derive(Debug, Default)]
struct FakeState {
    playlists: HashMap<String, FakePlaylist>,
    /// IDs whose fetches fail as if deleted upstream.
    missing: HashSet<String>,
    /// Fail the add batch with this (0-based, counted across calls) index once.
    fail_add_batch: Option<usize>,
    /// Fail every remove call.
    fail_remove: bool,
    add_batches: Vec<(String, usize)>,
    /// Acknowledged mutations in the order they were applied.
    calls: Vec<(&'static str, String)>,
    list_calls: HashMap<String, usize>,
    unauthorized: bool,
    next_id: usize,
    /// Delay propagation of newly created playlists by this many metadata polls.
    creation_lag: usize,
}

/// Playlist service backed by a map, with hooks for injecting failures.
#[derive(Debug, Default)]
pub struct FakePlaylistService {
    state: Mutex<FakeState>,
}

impl FakePlaylistService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playlist(self, id: &str, tracks: &[&str]) -> Self {
        self.with_playlist_tracks(id, tracks.iter().map(|t| (*t).to_string()).collect())
    }

    pub fn with_playlist_tracks(self, id: &str, tracks: Vec<TrackId>) -> Self {
        self.state.lock().playlists.insert(
            id.to_string(),
            FakePlaylist {
                name: id.to_string(),
                tracks,
                pending_metadata_polls: 0,
            },
        );
        self
    }

    /// Delete a playlist upstream.
    pub fn delete_upstream(&self, id: &str) {
        let mut state = self.state.lock();
        state.playlists.remove(id);
        state.missing.insert(id.to_string());
    }

    pub fn set_tracks(&self, id: &str, tracks: &[&str]) {
        if let Some(playlist) = self.state.lock().playlists.get_mut(id) {
            playlist.tracks = tracks.iter().map(|t| (*t).to_string()).collect();
        }
    }

    pub fn tracks(&self, id: &str) -> Vec<TrackId> {
        self.state
            .lock()
            .playlists
            .get(id)
            .map(|p| p.tracks.clone())
            .unwrap_or_default()
    }

    pub fn fail_add_batch(&self, index: usize) {
        self.state.lock().fail_add_batch = Some(index);
    }

    pub fn fail_remove(&self) {
        self.state.lock().fail_remove = true;
    }

    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.state.lock().unauthorized = unauthorized;
    }

    pub fn set_creation_lag(&self, polls: usize) {
        self.state.lock().creation_lag = polls;
    }

    /// Sizes of every add batch sent, in order.
    pub fn add_batch_sizes(&self) -> Vec<usize> {
        self.state.lock().add_batches.iter().map(|(_, n)| *n).collect()
    }

    /// `("add" | "remove" | "replace", playlist id)` per acknowledged call.
    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.state.lock().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn list_calls(&self, id: &str) -> usize {
        self.state.lock().list_calls.get(id).copied().unwrap_or(0)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.state.lock().playlists.contains_key(id)
    }

    fn check(state: &FakeState, id: &str) -> Result<()> {
        if state.unauthorized {
            return Err(Error::Authentication("token expired".into()));
        }
        if state.missing.contains(id) || !state.playlists.contains_key(id) {
            return Err(Error::Http(HttpError::StatusError {
                status: 404,
                message: format!("Playlist {id} not found"),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl PlaylistService for FakePlaylistService {
    async fn list_all_tracks(&self, playlist_id: &str) -> Result<Vec<TrackId>> {
        let mut state = self.state.lock();
        *state.list_calls.entry(playlist_id.to_string()).or_default() += 1;
        Self::check(&state, playlist_id)?;
        Ok(state.playlists[playlist_id].tracks.clone())
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, playlist_id)?;
        for batch in track_ids.chunks(MAX_BATCH_SIZE) {
            let index = state.add_batches.len();
            if state.fail_add_batch == Some(index) {
                state.fail_add_batch = None;
                return Err(Error::Http(HttpError::StatusError {
                    status: 502,
                    message: "Bad gateway".into(),
                }));
            }
            state.add_batches.push((playlist_id.to_string(), batch.len()));
            state.calls.push(("add", playlist_id.to_string()));
            if let Some(playlist) = state.playlists.get_mut(playlist_id) {
                playlist.tracks.extend(batch.iter().cloned());
            }
        }
        Ok(())
    }

    async fn remove_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, playlist_id)?;
        if state.fail_remove {
            return Err(Error::Http(HttpError::StatusError {
                status: 500,
                message: "Internal server error".into(),
            }));
        }
        state.calls.push(("remove", playlist_id.to_string()));
        let remove: HashSet<&TrackId> = track_ids.iter().collect();
        if let Some(playlist) = state.playlists.get_mut(playlist_id) {
            playlist.tracks.retain(|t| !remove.contains(t));
        }
        Ok(())
    }

    async fn replace_tracks(&self, playlist_id: &str, track_ids: &[TrackId]) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, playlist_id)?;
        state.calls.push(("replace", playlist_id.to_string()));
        if let Some(playlist) = state.playlists.get_mut(playlist_id) {
            playlist.tracks = track_ids.to_vec();
        }
        Ok(())
    }

    async fn get_metadata(&self, playlist_id: &str) -> Result<PlaylistMetadata> {
        let mut state = self.state.lock();
        Self::check(&state, playlist_id)?;
        let Some(playlist) = state.playlists.get_mut(playlist_id) else {
            return Err(Error::NotFound(playlist_id.to_string()));
        };

        let mut meta = PlaylistMetadata::new(playlist_id, playlist.name.clone());
        if playlist.pending_metadata_polls > 0 {
            playlist.pending_metadata_polls -= 1;
            return Ok(meta);
        }
        meta.owner = Some(PlaylistOwner::new(USER_ID));
        meta.track_count = Some(u32::try_from(playlist.tracks.len()).unwrap_or(u32::MAX));
        Ok(meta)
    }

    async fn create_playlist(
        &self,
        _owner_id: &str,
        name: &str,
        _description: Option<&str>,
    ) -> Result<PlaylistMetadata> {
        let mut state = self.state.lock();
        if state.unauthorized {
            return Err(Error::Authentication("token expired".into()));
        }
        state.next_id += 1;
        let id = format!("created{}", state.next_id);
        let lag = state.creation_lag;
        state.playlists.insert(
            id.clone(),
            FakePlaylist {
                name: name.to_string(),
                tracks: Vec::new(),
                pending_metadata_polls: lag,
            },
        );
        Ok(PlaylistMetadata::new(id, name))
    }

    async fn update_metadata(&self, playlist_id: &str, details: &PlaylistDetails) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, playlist_id)?;
        if let (Some(name), Some(playlist)) =
            (details.name.as_ref(), state.playlists.get_mut(playlist_id))
        {
            playlist.name.clone_from(name);
        }
        Ok(())
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, playlist_id)?;
        state.playlists.remove(playlist_id);
        Ok(())
    }

    async fn list_user_playlists(&self) -> Result<Vec<PlaylistMetadata>> {
        let state = self.state.lock();
        let mut playlists: Vec<_> = state
            .playlists
            .iter()
            .map(|(id, p)| PlaylistMetadata::new(id.clone(), p.name.clone()))
            .collect();
        playlists.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(playlists)
    }

    async fn current_user_id(&self) -> Result<String> {
        Ok(USER_ID.to_string())
    }
}

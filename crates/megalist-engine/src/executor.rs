//! Apply sync plans and populate playlists in resumable batches.

use megalist_core::{trackset, Error, PlaylistService, Result, TrackId, MAX_BATCH_SIZE};
use tracing::{debug, info, warn};

use crate::reconcile::SyncPlan;

/// Tracks sent per add request during population.
pub const BATCH_SIZE: usize = MAX_BATCH_SIZE;

/// Population of a playlist with a fixed track list, one batch at a time.
///
/// `added` counts tracks durably applied. When a batch fails the job keeps
/// its position, so calling [`PopulateJob::run`] again sends only what is
/// left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateJob {
    playlist_id: String,
    tracks: Vec<TrackId>,
    added: usize,
}

impl PopulateJob {
    pub fn new(playlist_id: impl Into<String>, tracks: Vec<TrackId>) -> Self {
        Self::resume_from(playlist_id, tracks, 0)
    }

    /// A job whose first `added` tracks are already in the playlist.
    pub fn resume_from(
        playlist_id: impl Into<String>,
        tracks: Vec<TrackId>,
        added: usize,
    ) -> Self {
        let added = added.min(tracks.len());
        Self {
            playlist_id: playlist_id.into(),
            tracks,
            added,
        }
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub const fn added(&self) -> usize {
        self.added
    }

    pub fn total(&self) -> usize {
        self.tracks.len()
    }

    pub fn remaining(&self) -> &[TrackId] {
        &self.tracks[self.added..]
    }

    pub fn is_complete(&self) -> bool {
        self.added >= self.tracks.len()
    }

    /// Send the remaining tracks in batches of [`BATCH_SIZE`], calling
    /// `on_progress(added, total)` after each successful batch.
    ///
    /// On failure returns [`Error::BatchMutation`] with the offset to resume
    /// from. Returns the number of tracks added overall.
    pub async fn run<S, F>(&mut self, service: &S, mut on_progress: F) -> Result<usize>
    where
        S: PlaylistService + ?Sized,
        F: FnMut(usize, usize) + Send,
    {
        let total = self.tracks.len();
        if self.added > 0 {
            info!(
                "Resuming population of {} at {}/{total}",
                self.playlist_id, self.added
            );
        }

        while self.added < total {
            let end = (self.added + BATCH_SIZE).min(total);
            let batch = &self.tracks[self.added..end];

            if let Err(e) = service.add_tracks(&self.playlist_id, batch).await {
                warn!(
                    "Population of {} stopped at {}/{total}: {e}",
                    self.playlist_id, self.added
                );
                return Err(Error::BatchMutation {
                    playlist_id: self.playlist_id.clone(),
                    offset: self.added,
                    source: Box::new(e),
                });
            }

            self.added = end;
            debug!("Populated {} {}/{total}", self.playlist_id, self.added);
            on_progress(self.added, total);
        }

        Ok(self.added)
    }
}

/// Whether to reorder a playlist after applying a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShuffleMode {
    #[default]
    Keep,
    Shuffle,
}

/// What applying a plan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub added: usize,
    pub removed: usize,
    pub shuffled: bool,
}

/// Apply a plan: removals first, then additions, then an optional shuffle.
/// Nothing is sent for an unchanged plan unless a shuffle is requested.
pub async fn apply_plan<S>(
    service: &S,
    plan: &SyncPlan,
    mode: ShuffleMode,
) -> Result<ApplyReport>
where
    S: PlaylistService + ?Sized,
{
    let mut report = ApplyReport::default();

    if !plan.to_remove.is_empty() {
        service.remove_tracks(&plan.playlist_id, &plan.to_remove).await?;
        report.removed = plan.to_remove.len();
    }

    if !plan.to_add.is_empty() {
        service.add_tracks(&plan.playlist_id, &plan.to_add).await?;
        report.added = plan.to_add.len();
    }

    if mode == ShuffleMode::Shuffle {
        shuffle_playlist(service, &plan.playlist_id).await?;
        report.shuffled = true;
    }

    info!(
        "Applied sync of {}: +{} -{}{}",
        plan.playlist_id,
        report.added,
        report.removed,
        if report.shuffled { ", shuffled" } else { "" }
    );
    Ok(report)
}

/// Randomly reorder a playlist in place. Returns its track count.
pub async fn shuffle_playlist<S>(service: &S, playlist_id: &str) -> Result<usize>
where
    S: PlaylistService + ?Sized,
{
    let mut tracks = service.list_all_tracks(playlist_id).await?;
    if tracks.len() < 2 {
        return Ok(tracks.len());
    }

    trackset::shuffle(&mut tracks);
    service.replace_tracks(playlist_id, &tracks).await?;
    debug!("Shuffled {} tracks in {playlist_id}", tracks.len());
    Ok(tracks.len())
}

//! User-facing flows over the playlist service and the registry.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use megalist_core::{
    trackset, Error, Megalist, MegalistKind, PlaylistDetails, PlaylistService, Result, TrackId,
};
use megalist_registry::MegalistRegistry;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::executor::{apply_plan, shuffle_playlist, ApplyReport, PopulateJob, ShuffleMode};
use crate::poller::{ConsistencyPoller, PollerConfig, PollerEvent};
use crate::reconcile::{
    fetch_sources, preview, preview_many, reconcile, PreviewCounts, PreviewTotals, SyncPlan,
};

/// Result of syncing one megalist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub plan: SyncPlan,
    /// `None` when nothing had to be sent.
    pub report: Option<ApplyReport>,
}

impl SyncOutcome {
    pub const fn applied(&self) -> bool {
        self.report.is_some()
    }
}

/// Result of syncing every megalist of a user.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub synced: Vec<(String, SyncOutcome)>,
    pub failed: Vec<(String, Error)>,
    /// Frozen records, surprise mixes, and records without sources.
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of removing megalists.
#[derive(Debug, Default)]
pub struct RemoveReport {
    pub removed: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

fn track_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Megalist operations, keeping the registry in step with the service.
pub struct MegalistService<S: PlaylistService + ?Sized> {
    service: Arc<S>,
    registry: MegalistRegistry,
    poller: Arc<ConsistencyPoller<S>>,
}

impl<S: PlaylistService + ?Sized + 'static> MegalistService<S> {
    pub fn new(service: Arc<S>, registry: MegalistRegistry, config: PollerConfig) -> Self {
        let poller = Arc::new(ConsistencyPoller::new(Arc::clone(&service), config));
        Self {
            service,
            registry,
            poller,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub const fn registry(&self) -> &MegalistRegistry {
        &self.registry
    }

    pub const fn poller(&self) -> &Arc<ConsistencyPoller<S>> {
        &self.poller
    }

    /// Start the background consistency loop.
    pub fn start_poller(&self) -> JoinHandle<()> {
        self.poller.spawn()
    }

    pub fn list(&self, owner_id: &str) -> Result<Vec<Megalist>> {
        self.registry.list_by_owner(owner_id)
    }

    /// Create the playlist and its record for a new merged megalist. The
    /// returned job still has to be run with [`MegalistService::populate`].
    ///
    /// Unreadable sources are left out. Fails without creating anything if
    /// no source can be read.
    pub async fn create_merged(
        &self,
        owner_id: &str,
        name: &str,
        mut sources: Vec<String>,
    ) -> Result<(Megalist, PopulateJob)> {
        let mut seen = HashSet::new();
        sources.retain(|s| seen.insert(s.clone()));
        if sources.is_empty() {
            return Err(Error::InvalidArgument(
                "a megalist needs at least one source".into(),
            ));
        }

        let fetched = fetch_sources(&*self.service, &sources, None).await?;
        if fetched.valid.is_empty() {
            return Err(Error::SourceUnavailable {
                playlist_id: fetched.invalid.join(", "),
                reason: "no source could be read".into(),
            });
        }

        let tracks = fetched.union();
        let description = format!("Merged from {} playlists", fetched.valid.len());
        let metadata = self
            .service
            .create_playlist(owner_id, name, Some(&description))
            .await?;

        let record = Megalist::merged(&metadata.id, owner_id, name, fetched.valid_ids());
        self.registry.upsert(&record)?;
        self.registry.save_population(&record.id, &tracks)?;
        self.poller.track(&metadata.id, tracks.is_empty());

        info!(
            "Created megalist {} from {} sources ({} tracks to add)",
            record.id,
            record.source_playlist_ids.len(),
            tracks.len()
        );
        Ok((record, PopulateJob::new(metadata.id, tracks)))
    }

    /// Run or resume a population job, recording progress in the registry
    /// even when a batch fails. Returns the new track count.
    ///
    /// The stored track list is kept until the job completes.
    pub async fn populate<F>(&self, job: &mut PopulateJob, on_progress: F) -> Result<u32>
    where
        F: FnMut(usize, usize) + Send,
    {
        let result = job.run(&*self.service, on_progress).await;

        let count = track_count(job.added());
        if let Err(e) = self.registry.update_track_count(job.playlist_id(), count) {
            warn!("Failed to record progress of {}: {e}", job.playlist_id());
        }
        if result.is_ok() {
            if let Err(e) = self.registry.clear_population(job.playlist_id()) {
                warn!("Failed to clear population of {}: {e}", job.playlist_id());
            }
        }

        result.map(|_| count)
    }

    /// Create and fully populate a merged megalist.
    pub async fn merge(
        &self,
        owner_id: &str,
        name: &str,
        sources: Vec<String>,
    ) -> Result<Megalist> {
        let (mut record, mut job) = self.create_merged(owner_id, name, sources).await?;
        record.track_count = self.populate(&mut job, |_, _| {}).await?;
        Ok(record)
    }

    /// Finish a population that stopped at `offset`.
    ///
    /// Continues the track list stored when the megalist was created, so
    /// source edits since then cannot shift what is left to send. A merged
    /// megalist without a stored list gets whatever its sources have that
    /// the playlist is missing.
    pub async fn resume_population(&self, playlist_id: &str, offset: usize) -> Result<Megalist> {
        let record = self.registry.require(playlist_id)?;

        let mut job = match self.registry.population(playlist_id)? {
            Some(tracks) => PopulateJob::resume_from(playlist_id, tracks, offset),
            None if record.kind == MegalistKind::Merged => {
                self.missing_from_sources(&record).await?
            }
            None => {
                return Err(Error::InvalidArgument(format!(
                    "{playlist_id} has no population to resume"
                )))
            }
        };

        self.populate(&mut job, |_, _| {}).await?;
        self.registry.require(playlist_id)
    }

    /// A job whose done part is the playlist as it stands and whose rest is
    /// every source track not in it yet.
    async fn missing_from_sources(&self, record: &Megalist) -> Result<PopulateJob> {
        let fetched = fetch_sources(&*self.service, &record.source_playlist_ids, None).await?;
        if !fetched.invalid.is_empty() {
            self.registry.update_sources(&record.id, &fetched.valid_ids())?;
        }

        let mut tracks = self.service.list_all_tracks(&record.id).await?;
        let present = tracks.len();
        let missing = trackset::difference(&fetched.union(), &trackset::dedupe(&tracks));
        debug!(
            "No stored track list for {}, {} source track(s) missing",
            record.id,
            missing.len()
        );

        tracks.extend(missing);
        Ok(PopulateJob::resume_from(record.id.clone(), tracks, present))
    }

    /// Start tracking an existing playlist the user owns. It becomes its own
    /// source, so syncing never removes its tracks.
    pub async fn adopt(&self, owner_id: &str, playlist_id: &str) -> Result<Megalist> {
        if self.registry.get(playlist_id)?.is_some() {
            return Err(Error::InvalidArgument(format!(
                "{playlist_id} is already a megalist"
            )));
        }

        let metadata = self.service.get_metadata(playlist_id).await?;
        if let Some(owner) = metadata.owner_id().filter(|owner| *owner != owner_id) {
            return Err(Error::InvalidArgument(format!(
                "{playlist_id} belongs to {owner}"
            )));
        }

        let record = Megalist::adopted(&metadata.id, owner_id, &metadata.name)
            .with_track_count(metadata.track_count.unwrap_or(0));
        self.registry.upsert(&record)?;
        info!("Adopted {} ({})", record.id, record.name);
        Ok(record)
    }

    /// Create the playlist and record for a random mix of up to `size`
    /// tracks drawn from the owner's non-isolated megalists. The returned
    /// job still has to be run with [`MegalistService::populate`].
    pub async fn create_surprise(
        &self,
        owner_id: &str,
        name: &str,
        size: usize,
    ) -> Result<(Megalist, PopulateJob)> {
        if size == 0 {
            return Err(Error::InvalidArgument("surprise size must be positive".into()));
        }

        let candidates: Vec<String> = self
            .registry
            .list_by_owner(owner_id)?
            .into_iter()
            .filter(|record| !record.is_isolated)
            .map(|record| record.id)
            .collect();
        if candidates.is_empty() {
            return Err(Error::InvalidArgument(
                "no megalists available to draw from".into(),
            ));
        }

        let fetched = fetch_sources(&*self.service, &candidates, None).await?;
        let picked = trackset::sample(&fetched.union(), size);
        if picked.is_empty() {
            return Err(Error::InvalidArgument("no tracks available to draw from".into()));
        }

        let description = format!("Surprise mix of {} tracks", picked.len());
        let metadata = self
            .service
            .create_playlist(owner_id, name, Some(&description))
            .await?;

        let record = Megalist::surprise(&metadata.id, owner_id, name);
        self.registry.upsert(&record)?;
        self.registry.save_population(&record.id, &picked)?;
        self.poller.track(&metadata.id, false);

        info!("Created surprise mix {} ({} tracks to add)", record.id, picked.len());
        Ok((record, PopulateJob::new(metadata.id, picked)))
    }

    /// Create and fully populate a surprise mix.
    pub async fn surprise(&self, owner_id: &str, name: &str, size: usize) -> Result<Megalist> {
        let (mut record, mut job) = self.create_surprise(owner_id, name, size).await?;
        record.track_count = self.populate(&mut job, |_, _| {}).await?;
        Ok(record)
    }

    pub async fn preview(&self, playlist_id: &str) -> Result<PreviewCounts> {
        let record = self.registry.require(playlist_id)?;
        preview(&*self.service, &record).await
    }

    /// Preview every syncable megalist of `owner_id`.
    pub async fn preview_all(&self, owner_id: &str) -> Result<PreviewTotals> {
        let records: Vec<Megalist> = self
            .registry
            .list_by_owner(owner_id)?
            .into_iter()
            .filter(Megalist::is_syncable)
            .collect();
        Ok(preview_many(&*self.service, &records).await)
    }

    /// Compute the plan that would bring a megalist in line with its
    /// sources, without sending anything.
    pub async fn plan(&self, playlist_id: &str) -> Result<SyncPlan> {
        let record = self.registry.require(playlist_id)?;
        reconcile(&*self.service, &record).await
    }

    /// Reconcile one megalist with its sources and apply the result.
    pub async fn sync(&self, playlist_id: &str, mode: ShuffleMode) -> Result<SyncOutcome> {
        let plan = self.plan(playlist_id).await?;
        self.apply(plan, mode).await
    }

    /// Apply a plan from [`MegalistService::plan`] as it stands.
    ///
    /// Sources that failed to load are dropped from the record. Nothing is
    /// sent when the playlist already matches, unless a shuffle is requested.
    pub async fn apply(&self, plan: SyncPlan, mode: ShuffleMode) -> Result<SyncOutcome> {
        let playlist_id = plan.playlist_id.as_str();
        let report = if plan.changed() || mode == ShuffleMode::Shuffle {
            Some(apply_plan(&*self.service, &plan, mode).await?)
        } else {
            None
        };

        if plan.sources_changed() {
            info!(
                "Dropping {} unavailable source(s) from {playlist_id}",
                plan.invalid_source_ids.len()
            );
            self.registry.update_sources(playlist_id, &plan.valid_source_ids)?;
        }
        if report.is_some() {
            self.registry.update_track_count(playlist_id, track_count(plan.final_track_count))?;
        }

        Ok(SyncOutcome { plan, report })
    }

    /// Sync every syncable megalist of `owner_id` concurrently. Each one
    /// settles on its own; failures are collected rather than stopping the
    /// rest.
    pub async fn sync_all(&self, owner_id: &str, mode: ShuffleMode) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let mut targets = Vec::new();
        for record in self.registry.list_by_owner(owner_id)? {
            if record.is_syncable() && !record.source_playlist_ids.is_empty() {
                targets.push(record.id);
            } else {
                report.skipped.push(record.id);
            }
        }

        let syncs = targets
            .iter()
            .map(|id| async move { (id.clone(), self.sync(id, mode).await) });

        for (id, result) in join_all(syncs).await {
            match result {
                Ok(outcome) => report.synced.push((id, outcome)),
                Err(e) => {
                    warn!("Sync of {id} failed: {e}");
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            "Synced {} megalist(s), {} failed, {} skipped",
            report.synced.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Add sources to a megalist. Returns the record and how many were new.
    pub fn add_sources(
        &self,
        playlist_id: &str,
        sources: Vec<String>,
    ) -> Result<(Megalist, usize)> {
        let mut record = self.registry.require(playlist_id)?;
        if !record.kind.is_reconcilable() {
            return Err(Error::NotReconcilable(playlist_id.to_string()));
        }

        let added = record.add_sources(sources);
        if added > 0 {
            self.registry.upsert(&record)?;
        }
        Ok((record, added))
    }

    /// Append tracks not already in the playlist. Returns how many were sent.
    ///
    /// On a merged megalist the next sync removes tracks no source has.
    pub async fn add_tracks(&self, playlist_id: &str, tracks: &[TrackId]) -> Result<usize> {
        self.registry.require(playlist_id)?;

        let current = self.service.list_all_tracks(playlist_id).await?;
        let wanted = trackset::union([tracks]);
        let new = trackset::difference(&wanted, &trackset::dedupe(&current));
        if new.is_empty() {
            debug!("All tracks already in {playlist_id}");
            return Ok(0);
        }

        self.service.add_tracks(playlist_id, &new).await?;
        self.registry
            .update_track_count(playlist_id, track_count(current.len() + new.len()))?;
        Ok(new.len())
    }

    pub fn set_frozen(&self, playlist_id: &str, frozen: bool) -> Result<Megalist> {
        self.registry.set_frozen(playlist_id, frozen)
    }

    pub fn set_isolated(&self, playlist_id: &str, isolated: bool) -> Result<Megalist> {
        self.registry.set_isolated(playlist_id, isolated)
    }

    pub async fn rename(&self, playlist_id: &str, name: &str) -> Result<()> {
        self.registry.require(playlist_id)?;
        self.service
            .update_metadata(playlist_id, &PlaylistDetails::name(name))
            .await?;
        self.registry.update_name(playlist_id, name)
    }

    /// Shuffle a megalist now. Returns its track count.
    pub async fn shuffle_now(&self, playlist_id: &str) -> Result<usize> {
        self.registry.require(playlist_id)?;
        shuffle_playlist(&*self.service, playlist_id).await
    }

    /// Unfollow playlists and forget their records. A playlist already gone
    /// upstream is still forgotten.
    pub async fn remove(&self, playlist_ids: &[String]) -> Result<RemoveReport> {
        let unfollows = playlist_ids
            .iter()
            .map(|id| async move { (id.clone(), self.service.unfollow_playlist(id).await) });

        let mut report = RemoveReport::default();
        for (id, result) in join_all(unfollows).await {
            match result {
                Ok(()) => report.removed.push(id),
                Err(e) if e.status() == Some(404) => {
                    debug!("{id} already gone upstream");
                    report.removed.push(id);
                }
                Err(e) => {
                    warn!("Failed to unfollow {id}: {e}");
                    report.failed.push((id, e));
                }
            }
        }

        self.registry.delete_many(&report.removed)?;
        Ok(report)
    }

    /// Store what the poller learned about a playlist. Returns whether a
    /// record was updated.
    pub fn apply_poller_event(&self, event: &PollerEvent) -> Result<bool> {
        match event {
            PollerEvent::Settled { metadata, .. } => {
                if self.registry.get(&metadata.id)?.is_none() {
                    return Ok(false);
                }
                let Some(count) = metadata.track_count else {
                    return Ok(false);
                };
                self.registry.update_track_count(&metadata.id, count)?;
                Ok(true)
            }
            PollerEvent::Abandoned { playlist_id } => {
                debug!("No settled metadata for {playlist_id}");
                Ok(false)
            }
        }
    }

    /// Apply every queued poller event. Returns how many updated a record.
    pub fn apply_poller_events(&self) -> usize {
        self.poller
            .drain_events()
            .iter()
            .filter(|event| match self.apply_poller_event(event) {
                Ok(updated) => updated,
                Err(e) => {
                    warn!("Failed to apply update for {}: {e}", event.playlist_id());
                    false
                }
            })
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fake::FakePlaylistService;

    const OWNER: &str = "me";

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn uris(range: std::ops::Range<usize>) -> Vec<TrackId> {
        range.map(|i| format!("spotify:track:{i}")).collect()
    }

    fn megalist_service(
        service: FakePlaylistService,
    ) -> (Arc<FakePlaylistService>, MegalistService<FakePlaylistService>) {
        let service = Arc::new(service);
        let megalists = MegalistService::new(
            Arc::clone(&service),
            MegalistRegistry::in_memory().unwrap(),
            PollerConfig::default(),
        );
        (service, megalists)
    }

    #[tokio::test]
    async fn test_merge_populates_union_and_records_it() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a", "b"])
                .with_playlist("s2", &["b", "c"]),
        );

        let record = megalists.merge(OWNER, "Mega", ids(&["s1", "s2", "s1"])).await.unwrap();

        assert_eq!(service.tracks(&record.id), ids(&["a", "b", "c"]));
        assert_eq!(record.track_count, 3);
        let stored = megalists.registry().require(&record.id).unwrap();
        assert_eq!(stored.source_playlist_ids, ids(&["s1", "s2"]));
        assert_eq!(stored.track_count, 3);
        assert!(megalists.poller().is_tracking(&record.id));
    }

    #[tokio::test]
    async fn test_merge_leaves_out_unreadable_sources() {
        let (service, megalists) =
            megalist_service(FakePlaylistService::new().with_playlist("s1", &["a"]));
        service.delete_upstream("s2");

        let record = megalists.merge(OWNER, "Mega", ids(&["s1", "s2"])).await.unwrap();
        assert_eq!(record.source_playlist_ids, ids(&["s1"]));
    }

    #[tokio::test]
    async fn test_merge_without_readable_sources_creates_nothing() {
        let (service, megalists) = megalist_service(FakePlaylistService::new());
        service.delete_upstream("s1");

        let err = megalists.merge(OWNER, "Mega", ids(&["s1"])).await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
        assert!(megalists.list(OWNER).unwrap().is_empty());
        assert!(!service.exists("created1"));
    }

    #[tokio::test]
    async fn test_interrupted_population_resumes() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new().with_playlist_tracks("s1", uris(0..250)),
        );
        service.fail_add_batch(2);

        let (record, mut job) = megalists
            .create_merged(OWNER, "Big", ids(&["s1"]))
            .await
            .unwrap();
        let err = megalists.populate(&mut job, |_, _| {}).await.unwrap_err();

        assert_eq!(err.resume_offset(), Some(200));
        assert_eq!(megalists.registry().require(&record.id).unwrap().track_count, 200);

        let count = megalists.populate(&mut job, |_, _| {}).await.unwrap();
        assert_eq!(count, 250);
        assert_eq!(service.add_batch_sizes(), vec![100, 100, 50]);
        assert_eq!(service.tracks(&record.id), uris(0..250));
    }

    #[tokio::test]
    async fn test_resume_population_from_offset() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new().with_playlist_tracks("s1", uris(0..250)),
        );
        service.fail_add_batch(2);

        let err = megalists.merge(OWNER, "Big", ids(&["s1"])).await.unwrap_err();
        let Error::BatchMutation {
            playlist_id,
            offset,
            ..
        } = err
        else {
            panic!("expected a batch failure");
        };

        let record = megalists.resume_population(&playlist_id, offset).await.unwrap();
        assert_eq!(record.track_count, 250);
        assert_eq!(service.add_batch_sizes(), vec![100, 100, 50]);
        assert_eq!(service.tracks(&playlist_id), uris(0..250));
        assert!(megalists.registry().population(&playlist_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_ignores_source_edits_since_failure() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new().with_playlist_tracks("s1", uris(0..250)),
        );
        service.fail_add_batch(2);

        let err = megalists.merge(OWNER, "Big", ids(&["s1"])).await.unwrap_err();
        let id = megalists.list(OWNER).unwrap()[0].id.clone();
        assert_eq!(err.resume_offset(), Some(200));

        let mut edited = vec!["spotify:track:new".to_string()];
        edited.extend(uris(0..250));
        service.set_tracks("s1", &edited.iter().map(String::as_str).collect::<Vec<_>>());

        megalists.resume_population(&id, 200).await.unwrap();
        assert_eq!(service.add_batch_sizes(), vec![100, 100, 50]);
        assert_eq!(service.tracks(&id), uris(0..250));

        // The next sync picks up the edit without doubling anything.
        let outcome = megalists.sync(&id, ShuffleMode::Keep).await.unwrap();
        assert_eq!(outcome.plan.to_add, ids(&["spotify:track:new"]));
        assert!(outcome.plan.to_remove.is_empty());
        let tracks = service.tracks(&id);
        assert_eq!(tracks.len(), 251);
        assert_eq!(tracks.iter().collect::<HashSet<_>>().len(), 251);
    }

    #[tokio::test]
    async fn test_resume_without_stored_list_adds_only_missing() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new().with_playlist_tracks("s1", uris(0..250)),
        );
        service.fail_add_batch(2);

        megalists.merge(OWNER, "Big", ids(&["s1"])).await.unwrap_err();
        let id = megalists.list(OWNER).unwrap()[0].id.clone();
        megalists.registry().clear_population(&id).unwrap();

        let mut edited = vec!["spotify:track:new".to_string()];
        edited.extend(uris(0..250));
        service.set_tracks("s1", &edited.iter().map(String::as_str).collect::<Vec<_>>());

        let record = megalists.resume_population(&id, 200).await.unwrap();
        assert_eq!(record.track_count, 251);
        let tracks = service.tracks(&id);
        assert_eq!(tracks.len(), 251);
        assert_eq!(tracks.iter().collect::<HashSet<_>>().len(), 251);
        assert_eq!(tracks[200], "spotify:track:new");
    }

    #[tokio::test]
    async fn test_sync_of_consistent_megalist_sends_nothing() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a"])
                .with_playlist("s2", &["b"]),
        );
        let record = megalists.merge(OWNER, "Mega", ids(&["s1", "s2"])).await.unwrap();
        let before = service.mutation_count();

        let outcome = megalists.sync(&record.id, ShuffleMode::Keep).await.unwrap();
        assert!(!outcome.applied());
        assert!(outcome.plan.is_noop());
        assert_eq!(service.mutation_count(), before);
    }

    #[tokio::test]
    async fn test_sync_follows_source_changes() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a", "b"])
                .with_playlist("s2", &["c"]),
        );
        let record = megalists.merge(OWNER, "Mega", ids(&["s1", "s2"])).await.unwrap();

        service.set_tracks("s1", &["b", "d"]);
        let outcome = megalists.sync(&record.id, ShuffleMode::Keep).await.unwrap();

        assert_eq!(
            outcome.report,
            Some(ApplyReport {
                added: 1,
                removed: 1,
                shuffled: false
            })
        );
        assert_eq!(service.tracks(&record.id), ids(&["b", "c", "d"]));
        assert_eq!(megalists.registry().require(&record.id).unwrap().track_count, 3);
    }

    #[tokio::test]
    async fn test_apply_sends_the_planned_diff() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a", "b"])
                .with_playlist("s2", &["c"]),
        );
        let record = megalists.merge(OWNER, "Mega", ids(&["s1", "s2"])).await.unwrap();

        service.set_tracks("s1", &["a", "d"]);
        let plan = megalists.plan(&record.id).await.unwrap();
        assert_eq!(
            plan.counts(),
            PreviewCounts {
                added: 1,
                removed: 1
            }
        );

        // Edits after the plan was shown are left for the next sync.
        service.set_tracks("s2", &["c", "e"]);
        let outcome = megalists.apply(plan, ShuffleMode::Keep).await.unwrap();

        assert_eq!(outcome.plan.to_add, ids(&["d"]));
        assert_eq!(service.tracks(&record.id), ids(&["a", "c", "d"]));
        assert_eq!(megalists.registry().require(&record.id).unwrap().track_count, 3);
    }

    #[tokio::test]
    async fn test_sync_drops_deleted_sources() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a"])
                .with_playlist("s2", &["b"]),
        );
        let record = megalists.merge(OWNER, "Mega", ids(&["s1", "s2"])).await.unwrap();

        service.delete_upstream("s2");
        megalists.sync(&record.id, ShuffleMode::Keep).await.unwrap();

        let stored = megalists.registry().require(&record.id).unwrap();
        assert_eq!(stored.source_playlist_ids, ids(&["s1"]));
        assert_eq!(service.tracks(&record.id), ids(&["a"]));

        // Nothing left to heal on the next run.
        let again = megalists.sync(&record.id, ShuffleMode::Keep).await.unwrap();
        assert!(again.plan.is_noop());
    }

    #[tokio::test]
    async fn test_sync_refuses_frozen_and_surprise() {
        let (_service, megalists) =
            megalist_service(FakePlaylistService::new().with_playlist("s1", &["a", "b"]));
        let record = megalists.merge(OWNER, "Mega", ids(&["s1"])).await.unwrap();
        megalists.set_frozen(&record.id, true).unwrap();

        assert!(matches!(
            megalists.sync(&record.id, ShuffleMode::Keep).await,
            Err(Error::Frozen(_))
        ));

        megalists.set_frozen(&record.id, false).unwrap();
        let mix = megalists.surprise(OWNER, "Mix", 1).await.unwrap();
        assert!(matches!(
            megalists.sync(&mix.id, ShuffleMode::Keep).await,
            Err(Error::NotReconcilable(_))
        ));
    }

    #[tokio::test]
    async fn test_sync_all_settles_every_record() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a"])
                .with_playlist("s2", &["b"]),
        );
        let ok = megalists.merge(OWNER, "Ok", ids(&["s1"])).await.unwrap();
        let broken = megalists.merge(OWNER, "Broken", ids(&["s2"])).await.unwrap();
        let frozen = megalists.merge(OWNER, "Frozen", ids(&["s1"])).await.unwrap();
        megalists.set_frozen(&frozen.id, true).unwrap();

        service.set_tracks("s1", &["a", "c"]);
        service.delete_upstream(&broken.id);

        let report = megalists.sync_all(OWNER, ShuffleMode::Keep).await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.synced.len(), 1);
        assert_eq!(report.synced[0].0, ok.id);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, broken.id);
        assert_eq!(report.skipped, vec![frozen.id]);
        assert_eq!(service.tracks(&ok.id), ids(&["a", "c"]));
    }

    #[tokio::test]
    async fn test_preview_all_skips_frozen() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a"])
                .with_playlist("s2", &["b"]),
        );
        let first = megalists.merge(OWNER, "One", ids(&["s1"])).await.unwrap();
        let second = megalists.merge(OWNER, "Two", ids(&["s2"])).await.unwrap();
        megalists.set_frozen(&second.id, true).unwrap();

        service.set_tracks("s1", &["a", "b", "c"]);
        service.set_tracks("s2", &["z"]);
        let before = service.mutation_count();

        let totals = megalists.preview_all(OWNER).await.unwrap();
        assert_eq!(
            totals.counts,
            PreviewCounts {
                added: 2,
                removed: 0
            }
        );
        assert_eq!(totals.previewed, 1);
        assert_eq!(megalists.preview(&first.id).await.unwrap().added, 2);
        assert_eq!(service.mutation_count(), before);
    }

    #[tokio::test]
    async fn test_adopt_tracks_existing_playlist() {
        let (service, megalists) =
            megalist_service(FakePlaylistService::new().with_playlist("mine", &["a", "b"]));

        let record = megalists.adopt(OWNER, "mine").await.unwrap();
        assert_eq!(record.kind, MegalistKind::Adopted);
        assert_eq!(record.source_playlist_ids, ids(&["mine"]));
        assert_eq!(record.track_count, 2);

        assert!(megalists.adopt(OWNER, "mine").await.is_err());

        // Syncing an adopted playlist keeps what it already has.
        let outcome = megalists.sync("mine", ShuffleMode::Keep).await.unwrap();
        assert!(outcome.plan.is_noop());
        assert_eq!(service.tracks("mine"), ids(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_surprise_draws_from_non_isolated() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a", "b", "c"])
                .with_playlist("s2", &["x", "y"]),
        );
        megalists.merge(OWNER, "Open", ids(&["s1"])).await.unwrap();
        let hidden = megalists.merge(OWNER, "Hidden", ids(&["s2"])).await.unwrap();
        megalists.set_isolated(&hidden.id, true).unwrap();

        let mix = megalists.surprise(OWNER, "Mix", 10).await.unwrap();

        assert_eq!(mix.kind, MegalistKind::Surprise);
        assert_eq!(mix.track_count, 3);
        let picked: HashSet<_> = service.tracks(&mix.id).into_iter().collect();
        assert_eq!(picked, ids(&["a", "b", "c"]).into_iter().collect());
    }

    #[tokio::test]
    async fn test_interrupted_surprise_resumes_same_sample() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new().with_playlist_tracks("s1", uris(0..300)),
        );
        megalists.merge(OWNER, "Pool", ids(&["s1"])).await.unwrap();
        let sent_before = service.add_batch_sizes().len();
        service.fail_add_batch(sent_before + 1);

        let (mix, mut job) = megalists.create_surprise(OWNER, "Mix", 150).await.unwrap();
        let err = megalists.populate(&mut job, |_, _| {}).await.unwrap_err();
        assert_eq!(err.resume_offset(), Some(100));
        let sample = megalists.registry().population(&mix.id).unwrap().unwrap();
        assert_eq!(sample.len(), 150);

        let record = megalists.resume_population(&mix.id, 100).await.unwrap();
        assert_eq!(record.track_count, 150);
        assert_eq!(service.tracks(&mix.id), sample);
        assert!(megalists.registry().population(&mix.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_of_adopted_rejected() {
        let (_service, megalists) =
            megalist_service(FakePlaylistService::new().with_playlist("mine", &["a"]));
        megalists.adopt(OWNER, "mine").await.unwrap();

        assert!(matches!(
            megalists.resume_population("mine", 0).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_surprise_needs_candidates() {
        let (_service, megalists) = megalist_service(FakePlaylistService::new());
        assert!(matches!(
            megalists.surprise(OWNER, "Mix", 5).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_add_sources_and_tracks() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a"])
                .with_playlist("s2", &["b"]),
        );
        let record = megalists.merge(OWNER, "Mega", ids(&["s1"])).await.unwrap();

        let (updated, added) = megalists
            .add_sources(&record.id, ids(&["s1", "s2", record.id.as_str()]))
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(updated.source_playlist_ids, ids(&["s1", "s2"]));

        let sent = megalists
            .add_tracks(&record.id, &ids(&["a", "z", "z"]))
            .await
            .unwrap();
        assert_eq!(sent, 1);
        assert_eq!(service.tracks(&record.id), ids(&["a", "z"]));
    }

    #[tokio::test]
    async fn test_rename_updates_both_sides() {
        let (_service, megalists) =
            megalist_service(FakePlaylistService::new().with_playlist("s1", &["a"]));
        let record = megalists.merge(OWNER, "Old", ids(&["s1"])).await.unwrap();

        megalists.rename(&record.id, "New").await.unwrap();
        assert_eq!(megalists.registry().require(&record.id).unwrap().name, "New");
        let metadata = megalists.service().get_metadata(&record.id).await.unwrap();
        assert_eq!(metadata.name, "New");
    }

    #[tokio::test]
    async fn test_remove_forgets_gone_playlists() {
        let (service, megalists) = megalist_service(
            FakePlaylistService::new()
                .with_playlist("s1", &["a"])
                .with_playlist("s2", &["b"]),
        );
        let kept = megalists.merge(OWNER, "Kept", ids(&["s1"])).await.unwrap();
        let gone = megalists.merge(OWNER, "Gone", ids(&["s2"])).await.unwrap();
        service.delete_upstream(&gone.id);

        let report = megalists
            .remove(&[kept.id.clone(), gone.id.clone()])
            .await
            .unwrap();

        assert_eq!(report.removed.len(), 2);
        assert!(report.failed.is_empty());
        assert!(megalists.list(OWNER).unwrap().is_empty());
        assert!(!service.exists(&kept.id));
    }

    #[tokio::test]
    async fn test_poller_events_refresh_counts() {
        let (service, megalists) =
            megalist_service(FakePlaylistService::new().with_playlist("s1", &["a", "b"]));
        service.set_creation_lag(1);
        let record = megalists.merge(OWNER, "Mega", ids(&["s1"])).await.unwrap();

        megalists.registry().update_track_count(&record.id, 0).unwrap();
        assert_eq!(megalists.poller().tick().await, 0);
        assert_eq!(megalists.poller().tick().await, 1);

        assert_eq!(megalists.apply_poller_events(), 1);
        assert_eq!(megalists.registry().require(&record.id).unwrap().track_count, 2);
    }
}

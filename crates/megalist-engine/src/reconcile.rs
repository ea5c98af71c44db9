//! Diff a megalist against the union of its sources.

use std::ops::AddAssign;

use futures::future::join_all;
use megalist_core::{trackset, Error, Megalist, PlaylistService, Result, TrackId};
use tracing::{debug, info, warn};

/// The minimal set of mutations that brings a megalist in line with its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub playlist_id: String,
    /// Tracks in the desired set but not in the playlist, in source order.
    pub to_add: Vec<TrackId>,
    /// Tracks in the playlist but not in the desired set.
    pub to_remove: Vec<TrackId>,
    /// Size of the desired set.
    pub final_track_count: usize,
    /// Sources that could be read, in record order.
    pub valid_source_ids: Vec<String>,
    /// Sources that failed to load and should be dropped from the record.
    pub invalid_source_ids: Vec<String>,
}

impl SyncPlan {
    fn unchanged(record: &Megalist) -> Self {
        Self {
            playlist_id: record.id.clone(),
            to_add: Vec::new(),
            to_remove: Vec::new(),
            final_track_count: record.track_count as usize,
            valid_source_ids: record.source_playlist_ids.clone(),
            invalid_source_ids: Vec::new(),
        }
    }

    /// Whether any track needs to be added or removed.
    pub fn changed(&self) -> bool {
        !self.to_add.is_empty() || !self.to_remove.is_empty()
    }

    /// Whether the record's source list needs rewriting.
    pub fn sources_changed(&self) -> bool {
        !self.invalid_source_ids.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        !self.changed() && !self.sources_changed()
    }

    pub fn counts(&self) -> PreviewCounts {
        PreviewCounts {
            added: self.to_add.len(),
            removed: self.to_remove.len(),
        }
    }
}

/// Tracks a sync would add and remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewCounts {
    pub added: usize,
    pub removed: usize,
}

impl AddAssign for PreviewCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.removed += rhs.removed;
    }
}

/// Aggregate preview over several megalists.
#[derive(Debug, Default)]
pub struct PreviewTotals {
    pub counts: PreviewCounts,
    /// Megalists that were previewed successfully.
    pub previewed: usize,
    /// Megalists whose preview failed, with the reason.
    pub failed: Vec<(String, Error)>,
}

/// Source tracks fetched for a megalist, split by whether the fetch worked.
#[derive(Debug, Default)]
pub(crate) struct SourceTracks {
    pub valid: Vec<(String, Vec<TrackId>)>,
    pub invalid: Vec<String>,
}

impl SourceTracks {
    pub fn valid_ids(&self) -> Vec<String> {
        self.valid.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Union of every valid source, in source order.
    pub fn union(&self) -> Vec<TrackId> {
        trackset::union(self.valid.iter().map(|(_, tracks)| tracks.as_slice()))
    }
}

/// Fetch every source concurrently. A source equal to `reuse`'s ID takes
/// the given tracks instead of being fetched again.
///
/// A failing source is recorded as invalid and the rest carry on. Errors
/// that concern the whole session (authentication, rate limiting) abort.
pub(crate) async fn fetch_sources<S>(
    service: &S,
    source_ids: &[String],
    reuse: Option<(&str, &[TrackId])>,
) -> Result<SourceTracks>
where
    S: PlaylistService + ?Sized,
{
    let fetches = source_ids.iter().map(|source_id| async move {
        let result = match reuse {
            Some((id, tracks)) if id == source_id.as_str() => Ok(tracks.to_vec()),
            _ => service.list_all_tracks(source_id).await,
        };
        (source_id, result)
    });

    let mut sources = SourceTracks::default();
    for (source_id, result) in join_all(fetches).await {
        match result {
            Ok(tracks) => sources.valid.push((source_id.clone(), tracks)),
            Err(e) if e.is_authentication() || e.is_rate_limited() => return Err(e),
            Err(e) => {
                let unavailable = Error::SourceUnavailable {
                    playlist_id: source_id.clone(),
                    reason: e.to_string(),
                };
                warn!("{unavailable}");
                sources.invalid.push(source_id.clone());
            }
        }
    }

    Ok(sources)
}

/// Compute the plan that makes `record`'s playlist equal the union of its
/// sources. Nothing is mutated.
///
/// Frozen records and surprise mixes are refused. A record without sources
/// yields an empty plan without touching the network.
pub async fn reconcile<S>(service: &S, record: &Megalist) -> Result<SyncPlan>
where
    S: PlaylistService + ?Sized,
{
    if record.is_frozen {
        return Err(Error::Frozen(record.id.clone()));
    }
    if !record.kind.is_reconcilable() {
        return Err(Error::NotReconcilable(record.id.clone()));
    }
    if record.source_playlist_ids.is_empty() {
        debug!("{} has no sources, nothing to reconcile", record.id);
        return Ok(SyncPlan::unchanged(record));
    }

    let current = service.list_all_tracks(&record.id).await?;
    let sources = fetch_sources(
        service,
        &record.source_playlist_ids,
        Some((record.id.as_str(), current.as_slice())),
    )
    .await?;

    let desired = sources.union();
    let to_add = trackset::difference(&desired, &trackset::dedupe(&current));
    let to_remove = trackset::difference(&current, &trackset::dedupe(&desired));

    let plan = SyncPlan {
        playlist_id: record.id.clone(),
        to_add,
        to_remove,
        final_track_count: desired.len(),
        valid_source_ids: sources.valid_ids(),
        invalid_source_ids: sources.invalid,
    };

    if plan.is_noop() {
        debug!("{} is already consistent with its sources", record.id);
    } else {
        info!(
            "Planned sync of {}: +{} -{} ({} sources dropped)",
            record.id,
            plan.to_add.len(),
            plan.to_remove.len(),
            plan.invalid_source_ids.len()
        );
    }

    Ok(plan)
}

/// Counts a sync of `record` would produce, without mutating anything.
pub async fn preview<S>(service: &S, record: &Megalist) -> Result<PreviewCounts>
where
    S: PlaylistService + ?Sized,
{
    reconcile(service, record).await.map(|plan| plan.counts())
}

/// Preview several megalists concurrently and sum the counts. A failure on
/// one record is reported and does not stop the others.
pub async fn preview_many<S>(service: &S, records: &[Megalist]) -> PreviewTotals
where
    S: PlaylistService + ?Sized,
{
    let previews = records
        .iter()
        .map(|record| async move { (record.id.clone(), preview(service, record).await) });

    let mut totals = PreviewTotals::default();
    for (id, result) in join_all(previews).await {
        match result {
            Ok(counts) => {
                totals.counts += counts;
                totals.previewed += 1;
            }
            Err(e) => {
                warn!("Preview of {id} failed: {e}");
                totals.failed.push((id, e));
            }
        }
    }
    totals
}

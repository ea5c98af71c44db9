//! # Megalist Engine
//!
//! Keeps derived playlists in line with their sources.
//!
//! - [`reconcile`] computes the minimal add/remove plan for a megalist.
//! - [`executor`] applies plans and populates new playlists in resumable batches.
//! - [`poller`] waits for freshly created playlists to become consistent.
//! - [`MegalistService`] ties those to the registry for each user-facing flow.

pub mod executor;
pub mod poller;
pub mod reconcile;
mod service;

#[cfg(test)]
mod fake;

pub use executor::{apply_plan, shuffle_playlist, ApplyReport, PopulateJob, ShuffleMode, BATCH_SIZE};
pub use poller::{ConsistencyPoller, PollerConfig, PollerEvent};
pub use reconcile::{preview, preview_many, reconcile, PreviewCounts, PreviewTotals, SyncPlan};
pub use service::{BatchReport, MegalistService, RemoveReport, SyncOutcome};

//! Wait for newly created playlists to become visible and consistent.
//!
//! The service is eventually consistent: a playlist fetched right after
//! creation may have no owner or a zero track count. The poller re-fetches
//! metadata for every tracked playlist on a fixed interval until it looks
//! settled or a timeout passes, then emits a [`PollerEvent`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use megalist_core::{PlaylistMetadata, PlaylistService};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Polling cadence and give-up time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Events emitted by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEvent {
    /// Tracking stopped and fresh metadata was read.
    Settled {
        metadata: PlaylistMetadata,
        /// True if the playlist never looked consistent before the timeout.
        timed_out: bool,
    },
    /// Tracking stopped on timeout and no metadata could be read.
    Abandoned { playlist_id: String },
}

impl PollerEvent {
    pub fn playlist_id(&self) -> &str {
        match self {
            Self::Settled { metadata, .. } => &metadata.id,
            Self::Abandoned { playlist_id } => playlist_id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TrackedPlaylist {
    /// The playlist is expected to stay empty, so a zero count is final.
    is_initially_empty: bool,
    started_at: Instant,
}

/// Whether metadata shows the playlist as fully propagated.
fn is_settled(metadata: &PlaylistMetadata, is_initially_empty: bool) -> bool {
    metadata.owner_id().is_some()
        && (is_initially_empty || metadata.track_count.is_some_and(|count| count > 0))
}

/// Interval-driven consistency poller over a set of tracked playlists.
///
/// One loop serves every tracked playlist; each tick fetches them
/// concurrently. Events are queued on an unbounded channel and read with
/// [`ConsistencyPoller::try_recv_event`] or [`ConsistencyPoller::drain_events`].
pub struct ConsistencyPoller<S: PlaylistService + ?Sized> {
    service: Arc<S>,
    config: PollerConfig,
    tracked: Mutex<HashMap<String, TrackedPlaylist>>,
    event_tx: UnboundedSender<PollerEvent>,
    event_rx: Mutex<UnboundedReceiver<PollerEvent>>,
}

impl<S: PlaylistService + ?Sized + 'static> ConsistencyPoller<S> {
    pub fn new(service: Arc<S>, config: PollerConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            service,
            config,
            tracked: Mutex::new(HashMap::new()),
            event_tx,
            event_rx: Mutex::new(event_rx),
        }
    }

    pub const fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Start tracking a playlist. Re-tracking resets its clock.
    pub fn track(&self, playlist_id: impl Into<String>, is_initially_empty: bool) {
        let playlist_id = playlist_id.into();
        debug!("Tracking {playlist_id} until it settles");
        self.tracked.lock().insert(
            playlist_id,
            TrackedPlaylist {
                is_initially_empty,
                started_at: Instant::now(),
            },
        );
    }

    pub fn is_tracking(&self, playlist_id: &str) -> bool {
        self.tracked.lock().contains_key(playlist_id)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Poll every tracked playlist once. Returns how many stopped being
    /// tracked.
    pub async fn tick(&self) -> usize {
        let snapshot: Vec<(String, TrackedPlaylist)> = self
            .tracked
            .lock()
            .iter()
            .map(|(id, tracked)| (id.clone(), *tracked))
            .collect();
        if snapshot.is_empty() {
            return 0;
        }

        let checks = snapshot.into_iter().map(|(id, tracked)| async move {
            let result = self.service.get_metadata(&id).await;
            (id, tracked, result)
        });

        let mut stopped = 0;
        for (id, tracked, result) in join_all(checks).await {
            let settled = match &result {
                Ok(metadata) => is_settled(metadata, tracked.is_initially_empty),
                Err(e) => {
                    debug!("Metadata for {id} not readable yet: {e}");
                    false
                }
            };
            let elapsed = tracked.started_at.elapsed();
            let timed_out = !settled && elapsed >= self.config.timeout;
            if !settled && !timed_out {
                continue;
            }

            if timed_out {
                warn!("Gave up waiting for {id} to settle after {elapsed:?}");
            }

            // Refresh once more so the cached view is as recent as possible.
            let latest = match self.service.get_metadata(&id).await {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    debug!("Final refresh of {id} failed: {e}");
                    result.ok()
                }
            };

            self.tracked.lock().remove(&id);
            stopped += 1;

            let event = match latest {
                Some(metadata) => {
                    info!(
                        "{id} settled with {} tracks",
                        metadata.track_count.unwrap_or(0)
                    );
                    PollerEvent::Settled {
                        metadata,
                        timed_out,
                    }
                }
                None => PollerEvent::Abandoned { playlist_id: id },
            };
            let _ = self.event_tx.send(event);
        }

        stopped
    }

    /// Run [`ConsistencyPoller::tick`] on the configured interval until the
    /// task is aborted.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poller.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if poller.tracked_count() > 0 {
                    poller.tick().await;
                }
            }
        })
    }

    /// Try to receive an event without waiting.
    pub fn try_recv_event(&self) -> Option<PollerEvent> {
        match self.event_rx.lock().try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Take every queued event.
    pub fn drain_events(&self) -> Vec<PollerEvent> {
        std::iter::from_fn(|| self.try_recv_event()).collect()
    }
}

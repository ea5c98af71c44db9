//! The derived playlist ("megalist") record.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What kind of derived playlist a record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MegalistKind {
    /// Union of its sources, kept in sync by reconciliation.
    #[default]
    Merged,
    /// Random sample drawn once; never reconciled.
    Surprise,
    /// A pre-existing playlist the user chose to track.
    Adopted,
}

impl MegalistKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Merged => "MERGED",
            Self::Surprise => "SURPRISE",
            Self::Adopted => "ADOPTED",
        }
    }

    /// Whether records of this kind take part in reconciliation.
    pub const fn is_reconcilable(&self) -> bool {
        matches!(self, Self::Merged | Self::Adopted)
    }
}

impl fmt::Display for MegalistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MegalistKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MERGED" => Ok(Self::Merged),
            "SURPRISE" => Ok(Self::Surprise),
            "ADOPTED" => Ok(Self::Adopted),
            other => Err(Error::InvalidArgument(format!(
                "unknown megalist kind: {other}"
            ))),
        }
    }
}

/// Persisted record mapping a derived playlist to its sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Megalist {
    /// External playlist ID, also the registry key.
    pub id: String,
    /// User who owns the playlist.
    pub owner_id: String,
    /// Playlist name at the time of the last update.
    pub name: String,
    /// Source playlists whose tracks are unioned, in order.
    pub source_playlist_ids: Vec<String>,
    /// Cached track count. Advisory only.
    pub track_count: u32,
    /// Kind of derived playlist.
    pub kind: MegalistKind,
    /// Excluded from reconciliation.
    pub is_frozen: bool,
    /// Excluded from surprise sampling.
    pub is_isolated: bool,
}

impl Megalist {
    /// A merged megalist over the given sources.
    pub fn merged(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        name: impl Into<String>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            name: name.into(),
            source_playlist_ids: sources,
            track_count: 0,
            kind: MegalistKind::Merged,
            is_frozen: false,
            is_isolated: false,
        }
    }

    /// An adopted playlist, marked as its own source of truth.
    pub fn adopted(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            source_playlist_ids: vec![id.clone()],
            kind: MegalistKind::Adopted,
            ..Self::merged(id, owner_id, name, Vec::new())
        }
    }

    /// A surprise mix. Has no sources and is never reconciled.
    pub fn surprise(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: MegalistKind::Surprise,
            ..Self::merged(id, owner_id, name, Vec::new())
        }
    }

    #[must_use]
    pub const fn with_track_count(mut self, count: u32) -> Self {
        self.track_count = count;
        self
    }

    /// Whether the record lists itself as a source.
    pub fn is_self_sourced(&self) -> bool {
        self.source_playlist_ids.iter().any(|s| s == &self.id)
    }

    /// Whether an automatic reconciliation may target this record.
    pub const fn is_syncable(&self) -> bool {
        !self.is_frozen && self.kind.is_reconcilable()
    }

    /// Check the record's invariants.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidArgument("megalist id is empty".into()));
        }

        if self.kind != MegalistKind::Adopted && self.is_self_sourced() {
            return Err(Error::InvalidArgument(format!(
                "{} megalist {} cannot list itself as a source",
                self.kind, self.id
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self
            .source_playlist_ids
            .iter()
            .find(|s| !seen.insert(s.as_str()))
        {
            return Err(Error::InvalidArgument(format!(
                "source {dup} listed more than once on {}",
                self.id
            )));
        }

        if self.kind == MegalistKind::Surprise {
            if !self.source_playlist_ids.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "surprise mix {} cannot have sources",
                    self.id
                )));
            }
            if self.is_frozen {
                return Err(Error::InvalidArgument(format!(
                    "surprise mix {} cannot be frozen",
                    self.id
                )));
            }
        }

        Ok(())
    }

    /// Append sources not already present, skipping the record's own ID
    /// unless it is adopted. Returns how many were added.
    pub fn add_sources<I>(&mut self, sources: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for source in sources {
            if source == self.id && self.kind != MegalistKind::Adopted {
                continue;
            }
            if !self.source_playlist_ids.contains(&source) {
                self.source_playlist_ids.push(source);
                added += 1;
            }
        }
        added
    }
}

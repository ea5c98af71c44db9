//! # megalist-registry
//!
//! Persistent registry of derived playlists (`SQLite`).
//!
//! Each row maps a megalist to its source playlists, its cached track count
//! and its state flags. The registry is the source of truth for which
//! sources a megalist should have; the external service is the source of
//! truth for what tracks it actually contains.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use directories::ProjectDirs;
use megalist_core::{Error, Megalist, MegalistKind, Result, TrackId};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS megalists (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        source_playlist_ids TEXT NOT NULL,
        track_count INTEGER NOT NULL DEFAULT 0,
        is_frozen INTEGER NOT NULL DEFAULT 0,
        is_isolated INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_megalists_owner ON megalists(owner_id);

    CREATE TABLE IF NOT EXISTS populations (
        megalist_id TEXT PRIMARY KEY,
        tracks TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
";

const SELECT_COLUMNS: &str =
    "id, owner_id, name, kind, source_playlist_ids, track_count, is_frozen, is_isolated";

/// Registry of derived playlists.
#[derive(Clone)]
pub struct MegalistRegistry {
    /// `SQLite` database connection.
    db: Arc<Mutex<Connection>>,
    /// Database file, `None` for in-memory registries.
    path: Option<PathBuf>,
}

impl MegalistRegistry {
    /// Open the registry in the platform data directory.
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "megalist", "Megalist")
            .ok_or_else(|| Error::Registry("Failed to determine data directory".to_string()))?;

        Self::with_path(project_dirs.data_dir().join("megalist.db"))
    }

    /// Open (or create) the registry at a specific database file.
    pub fn with_path(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Registry(format!("Failed to create data directory: {e}")))?;
        }

        let db = Connection::open(db_path)
            .map_err(|e| Error::Registry(format!("Failed to open database: {e}")))?;

        let registry = Self::init(db, Some(db_path.to_path_buf()))?;
        info!("Registry opened at {}", db_path.display());
        Ok(registry)
    }

    /// A registry that lives only as long as this value.
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| Error::Registry(format!("Failed to open database: {e}")))?;
        Self::init(db, None)
    }

    fn init(db: Connection, path: Option<PathBuf>) -> Result<Self> {
        db.execute_batch(SCHEMA)
            .map_err(|e| Error::Registry(format!("Failed to initialize database: {e}")))?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            path,
        })
    }

    /// Get the database file path.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or replace a record. The record is validated first.
    pub fn upsert(&self, record: &Megalist) -> Result<()> {
        record.validate()?;

        let sources = serde_json::to_string(&record.source_playlist_ids)?;
        let now = Utc::now().to_rfc3339();

        let db = self.db.lock();
        db.execute(
            "INSERT INTO megalists (id, owner_id, name, kind, source_playlist_ids,
                                    track_count, is_frozen, is_isolated, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                name = excluded.name,
                kind = excluded.kind,
                source_playlist_ids = excluded.source_playlist_ids,
                track_count = excluded.track_count,
                is_frozen = excluded.is_frozen,
                is_isolated = excluded.is_isolated,
                updated_at = excluded.updated_at",
            params![
                record.id,
                record.owner_id,
                record.name,
                record.kind.as_str(),
                sources,
                record.track_count,
                record.is_frozen,
                record.is_isolated,
                now,
            ],
        )
        .map_err(|e| Error::Registry(format!("Failed to store megalist: {e}")))?;

        debug!("Stored megalist {} ({})", record.id, record.kind);
        Ok(())
    }

    /// Find a record by ID.
    pub fn get(&self, id: &str) -> Result<Option<Megalist>> {
        let db = self.db.lock();
        db.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM megalists WHERE id = ?"),
            [id],
            read_row,
        )
        .optional()
        .map_err(|e| Error::Registry(format!("Failed to load megalist {id}: {e}")))?
        .transpose()
    }

    /// Find a record by ID, failing if it does not exist.
    pub fn require(&self, id: &str) -> Result<Megalist> {
        self.get(id)?.ok_or_else(|| Error::NotFound(format!("megalist {id}")))
    }

    /// All records owned by a user, in creation order.
    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Megalist>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM megalists WHERE owner_id = ? ORDER BY created_at, id"
            ))
            .map_err(|e| Error::Registry(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([owner_id], read_row)
            .map_err(|e| Error::Registry(format!("Failed to list megalists: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            let record =
                row.map_err(|e| Error::Registry(format!("Failed to read megalist row: {e}")))?;
            records.push(record?);
        }
        Ok(records)
    }

    /// Delete a record. Returns true if it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.delete_many(&[id])? == 1)
    }

    /// Delete several records in one transaction. Returns how many existed.
    pub fn delete_many<S: AsRef<str>>(&self, ids: &[S]) -> Result<usize> {
        let mut db = self.db.lock();
        let tx = db
            .transaction()
            .map_err(|e| Error::Registry(format!("Failed to begin transaction: {e}")))?;

        let mut deleted = 0;
        for id in ids {
            deleted += tx
                .execute("DELETE FROM megalists WHERE id = ?", [id.as_ref()])
                .map_err(|e| Error::Registry(format!("Failed to delete megalist: {e}")))?;
            tx.execute("DELETE FROM populations WHERE megalist_id = ?", [id.as_ref()])
                .map_err(|e| Error::Registry(format!("Failed to delete population: {e}")))?;
        }

        tx.commit()
            .map_err(|e| Error::Registry(format!("Failed to commit deletion: {e}")))?;

        if deleted > 0 {
            info!("Deleted {deleted} megalist record(s)");
        }
        Ok(deleted)
    }

    /// Freeze or unfreeze a record.
    pub fn set_frozen(&self, id: &str, frozen: bool) -> Result<Megalist> {
        let mut record = self.require(id)?;
        record.is_frozen = frozen;
        self.upsert(&record)?;
        Ok(record)
    }

    /// Include or exclude a record from surprise sampling.
    pub fn set_isolated(&self, id: &str, isolated: bool) -> Result<Megalist> {
        let mut record = self.require(id)?;
        record.is_isolated = isolated;
        self.upsert(&record)?;
        Ok(record)
    }

    /// Refresh the cached track count.
    pub fn update_track_count(&self, id: &str, track_count: u32) -> Result<()> {
        self.update_column(id, "track_count", &track_count)
    }

    /// Replace the source list (e.g. after dropping sources that no longer resolve).
    pub fn update_sources(&self, id: &str, sources: &[String]) -> Result<Megalist> {
        let mut record = self.require(id)?;
        record.source_playlist_ids = sources.to_vec();
        self.upsert(&record)?;
        Ok(record)
    }

    /// Update the stored name.
    pub fn update_name(&self, id: &str, name: &str) -> Result<()> {
        self.update_column(id, "name", &name)
    }

    fn update_column(&self, id: &str, column: &str, value: &dyn rusqlite::ToSql) -> Result<()> {
        let db = self.db.lock();
        let changed = db
            .execute(
                &format!("UPDATE megalists SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                params![value, Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| Error::Registry(format!("Failed to update {column}: {e}")))?;

        if changed == 0 {
            return Err(Error::NotFound(format!("megalist {id}")));
        }
        Ok(())
    }

    /// Remember the full track list a new megalist is being populated with,
    /// so an interrupted population can continue from its offset later.
    pub fn save_population(&self, id: &str, tracks: &[TrackId]) -> Result<()> {
        let tracks = serde_json::to_string(tracks)?;

        let db = self.db.lock();
        db.execute(
            "INSERT OR REPLACE INTO populations (megalist_id, tracks, created_at)
             VALUES (?1, ?2, ?3)",
            params![id, tracks, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Registry(format!("Failed to store population of {id}: {e}")))?;
        Ok(())
    }

    /// The stored track list of an unfinished population.
    pub fn population(&self, id: &str) -> Result<Option<Vec<TrackId>>> {
        let db = self.db.lock();
        let stored: Option<String> = db
            .query_row(
                "SELECT tracks FROM populations WHERE megalist_id = ?",
                [id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Registry(format!("Failed to load population of {id}: {e}")))?;

        stored
            .map(|tracks| {
                serde_json::from_str(&tracks).map_err(|e| {
                    Error::Registry(format!("Corrupt population for megalist {id}: {e}"))
                })
            })
            .transpose()
    }

    /// Forget a finished population.
    pub fn clear_population(&self, id: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute("DELETE FROM populations WHERE megalist_id = ?", [id])
            .map_err(|e| Error::Registry(format!("Failed to clear population of {id}: {e}")))?;
        Ok(())
    }

    /// Count records per kind for an owner.
    pub fn stats(&self, owner_id: &str) -> Result<RegistryStats> {
        let records = self.list_by_owner(owner_id)?;
        let mut stats = RegistryStats::default();
        for record in &records {
            match record.kind {
                MegalistKind::Merged => stats.merged += 1,
                MegalistKind::Surprise => stats.surprise += 1,
                MegalistKind::Adopted => stats.adopted += 1,
            }
            if record.is_frozen {
                stats.frozen += 1;
            }
        }
        Ok(stats)
    }
}

/// Per-kind record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub merged: usize,
    pub surprise: usize,
    pub adopted: usize,
    pub frozen: usize,
}

impl RegistryStats {
    pub const fn total(&self) -> usize {
        self.merged + self.surprise + self.adopted
    }
}

/// Row as stored, before our own columns are decoded.
struct StoredRow {
    id: String,
    owner_id: String,
    name: String,
    kind: String,
    sources: String,
    track_count: u32,
    is_frozen: bool,
    is_isolated: bool,
}

impl StoredRow {
    fn into_record(self) -> Result<Megalist> {
        let source_playlist_ids = serde_json::from_str(&self.sources).map_err(|e| {
            Error::Registry(format!("Corrupt source list for megalist {}: {e}", self.id))
        })?;

        Ok(Megalist {
            kind: self.kind.parse()?,
            source_playlist_ids,
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            track_count: self.track_count,
            is_frozen: self.is_frozen,
            is_isolated: self.is_isolated,
        })
    }
}

/// Map a row to a record. Decoding errors of our own columns are returned
/// in the inner `Result` so they surface as registry errors.
fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<Megalist>> {
    let stored = StoredRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        sources: row.get(4)?,
        track_count: row.get(5)?,
        is_frozen: row.get(6)?,
        is_isolated: row.get(7)?,
    };
    Ok(stored.into_record())
}

//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "megalist", version)]
#[command(about = "Merge playlists into megalists and keep them in sync")]
pub struct Cli {
    /// Access token for the playlist service.
    #[arg(long, env = "MEGALIST_ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// User the megalists belong to (defaults to the token's user).
    #[arg(long, env = "MEGALIST_OWNER_ID", global = true)]
    pub owner: Option<String>,

    /// Registry database file.
    #[arg(long, env = "MEGALIST_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Playlist service base URL.
    #[arg(long, env = "MEGALIST_API_BASE_URL", global = true)]
    pub api_base_url: Option<String>,

    /// Settings file (defaults to the platform config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List your megalists.
    List,
    /// List the playlists in your library.
    Playlists,
    /// Registry counts per kind.
    Stats,
    /// Create a megalist from the union of several playlists.
    Merge {
        name: String,
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Track an existing playlist of yours as a megalist.
    Adopt { playlist_id: String },
    /// Create a random mix from your non-isolated megalists.
    Surprise {
        name: String,
        #[arg(long, default_value_t = 50)]
        size: usize,
    },
    /// Show what a sync would change, for one megalist or all of them.
    Preview { id: Option<String> },
    /// Bring a megalist in line with its sources.
    Sync {
        id: String,
        /// Shuffle the playlist after syncing.
        #[arg(long)]
        shuffle: bool,
        /// Apply without asking.
        #[arg(short, long)]
        yes: bool,
    },
    /// Sync every megalist that is not frozen.
    SyncAll {
        #[arg(long)]
        shuffle: bool,
        #[arg(short, long)]
        yes: bool,
    },
    /// Exclude a megalist from syncing.
    Freeze { id: String },
    Unfreeze { id: String },
    /// Exclude a megalist from surprise mixes.
    Isolate { id: String },
    Unisolate { id: String },
    /// Add source playlists to a megalist.
    AddSources {
        id: String,
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Add tracks that are not in the playlist yet.
    AddTracks {
        id: String,
        #[arg(required = true)]
        tracks: Vec<String>,
    },
    Rename { id: String, name: String },
    /// Finish populating a megalist after a failed batch.
    Resume { id: String, offset: usize },
    /// Randomly reorder a megalist.
    Shuffle { id: String },
    /// Unfollow megalists and forget them.
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

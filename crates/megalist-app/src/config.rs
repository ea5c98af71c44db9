//! Settings file, overridden by flags and environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use megalist_client::DEFAULT_BASE_URL;
use megalist_engine::PollerConfig;
use serde::Deserialize;
use tracing::debug;

use crate::cli::Cli;

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub owner_id: Option<String>,
    pub database_path: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            owner_id: None,
            database_path: None,
            poll_interval_secs: 2,
            poll_timeout_secs: 30,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// `<config dir>/megalist/config.toml` on this platform.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "megalist", "Megalist")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load settings from `path`, or from the default location. A missing
    /// default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            debug!("No settings file at {}", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply flags (clap has already folded in their environment variables).
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.api_base_url {
            self.api_base_url.clone_from(url);
        }
        if let Some(owner) = &cli.owner {
            self.owner_id = Some(owner.clone());
        }
        if let Some(database) = &cli.database {
            self.database_path = Some(database.clone());
        }
    }

    /// Per-request timeout for the playlist client.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }
}

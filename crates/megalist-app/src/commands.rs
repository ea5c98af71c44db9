//! Command handlers.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use megalist_client::{ClientContext, PlaylistClient};
use megalist_core::Megalist;
use megalist_engine::{MegalistService, PollerConfig, PopulateJob, PreviewCounts, ShuffleMode};
use megalist_registry::MegalistRegistry;
use tracing::{info, warn};

use crate::cli::Command;
use crate::config::Settings;

/// Everything a command needs: the service flows and whose megalists they act on.
pub struct App {
    megalists: MegalistService<PlaylistClient>,
    owner_id: String,
    poll: PollerConfig,
}

impl App {
    pub async fn connect(settings: &Settings, token: Option<String>) -> Result<Self> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .context("No access token; pass --token or set MEGALIST_ACCESS_TOKEN")?;

        let context = ClientContext::with_token(token)
            .with_base_url(settings.api_base_url.clone())
            .with_timeout(settings.request_timeout());
        let client = Arc::new(PlaylistClient::new(context)?);

        let registry = match &settings.database_path {
            Some(path) => MegalistRegistry::with_path(path)?,
            None => MegalistRegistry::new()?,
        };

        let owner_id = match &settings.owner_id {
            Some(owner) => owner.clone(),
            None => client
                .current_user_id()
                .await
                .context("Failed to look up the current user")?,
        };

        let poll = settings.poller_config();
        Ok(Self {
            megalists: MegalistService::new(client, registry, poll),
            owner_id,
            poll,
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        let owner = self.owner_id.as_str();

        match command {
            Command::List => {
                let records = self.megalists.list(owner)?;
                if records.is_empty() {
                    println!("No megalists yet.");
                }
                for record in &records {
                    print_record(record);
                }
            }
            Command::Playlists => {
                for playlist in self.megalists.service().list_user_playlists().await? {
                    println!("{}  {}  ({})", playlist.id, playlist.name, playlist.subtitle());
                }
            }
            Command::Stats => {
                let stats = self.megalists.registry().stats(owner)?;
                println!(
                    "{} megalists: {} merged, {} adopted, {} surprise ({} frozen)",
                    stats.total(),
                    stats.merged,
                    stats.adopted,
                    stats.surprise,
                    stats.frozen
                );
            }
            Command::Merge { name, sources } => self.merge(&name, sources).await?,
            Command::Adopt { playlist_id } => {
                let record = self.megalists.adopt(owner, &playlist_id).await?;
                print_record(&record);
            }
            Command::Surprise { name, size } => {
                let (record, job) = self.megalists.create_surprise(owner, &name, size).await?;
                self.populate(&record, job).await?;
            }
            Command::Preview { id: Some(id) } => {
                let counts = self.megalists.preview(&id).await?;
                println!("{id}: {}", describe(counts));
            }
            Command::Preview { id: None } => {
                let totals = self.megalists.preview_all(owner).await?;
                println!("{} megalists: {}", totals.previewed, describe(totals.counts));
                for (id, e) in &totals.failed {
                    println!("  {id}: {e}");
                }
            }
            Command::Sync { id, shuffle, yes } => {
                self.sync(&id, shuffle_mode(shuffle), yes).await?;
            }
            Command::SyncAll { shuffle, yes } => self.sync_all(shuffle_mode(shuffle), yes).await?,
            Command::Freeze { id } => print_record(&self.megalists.set_frozen(&id, true)?),
            Command::Unfreeze { id } => print_record(&self.megalists.set_frozen(&id, false)?),
            Command::Isolate { id } => print_record(&self.megalists.set_isolated(&id, true)?),
            Command::Unisolate { id } => print_record(&self.megalists.set_isolated(&id, false)?),
            Command::AddSources { id, sources } => {
                let (record, added) = self.megalists.add_sources(&id, sources)?;
                println!("Added {added} source(s)");
                print_record(&record);
            }
            Command::AddTracks { id, tracks } => {
                let added = self.megalists.add_tracks(&id, &tracks).await?;
                println!("Added {added} track(s) to {id}");
            }
            Command::Rename { id, name } => {
                self.megalists.rename(&id, &name).await?;
                println!("Renamed {id} to {name}");
            }
            Command::Resume { id, offset } => {
                let record = self.megalists.resume_population(&id, offset).await?;
                print_record(&record);
            }
            Command::Shuffle { id } => {
                let count = self.megalists.shuffle_now(&id).await?;
                println!("Shuffled {count} tracks in {id}");
            }
            Command::Remove { ids } => {
                let report = self.megalists.remove(&ids).await?;
                println!("Removed {} megalist(s)", report.removed.len());
                for (id, e) in &report.failed {
                    println!("  {id}: {e}");
                }
            }
        }

        Ok(())
    }

    async fn merge(&self, name: &str, sources: Vec<String>) -> Result<()> {
        let (record, job) = self
            .megalists
            .create_merged(&self.owner_id, name, sources)
            .await?;
        self.populate(&record, job).await
    }

    /// Fill a newly created megalist, printing progress, or the command that
    /// finishes the job if a batch fails.
    async fn populate(&self, record: &Megalist, mut job: PopulateJob) -> Result<()> {
        println!("Created {} ({}), adding {} tracks", record.id, record.name, job.total());

        let result = self
            .megalists
            .populate(&mut job, |added, total| println!("  {added}/{total}"))
            .await;

        if let Err(e) = result {
            if let Some(offset) = e.resume_offset() {
                println!(
                    "Stopped after {offset} tracks. Finish with: megalist resume {} {offset}",
                    record.id
                );
            }
            return Err(e.into());
        }

        self.wait_for_settle().await;
        if let Some(record) = self.megalists.registry().get(&record.id)? {
            print_record(&record);
        }
        Ok(())
    }

    /// Show the plan, then apply exactly that plan once confirmed.
    async fn sync(&self, id: &str, mode: ShuffleMode, yes: bool) -> Result<()> {
        let plan = self.megalists.plan(id).await?;

        if plan.changed() || mode == ShuffleMode::Shuffle {
            println!("{id}: {}", describe(plan.counts()));
            if !yes && !confirm("Apply?")? {
                println!("Nothing changed.");
                return Ok(());
            }
        }

        let outcome = self.megalists.apply(plan, mode).await?;
        if outcome.plan.sources_changed() {
            println!(
                "Dropped unavailable sources: {}",
                outcome.plan.invalid_source_ids.join(", ")
            );
        }
        match outcome.report {
            Some(report) => println!(
                "Synced {id}: +{} -{}{}",
                report.added,
                report.removed,
                if report.shuffled { ", shuffled" } else { "" }
            ),
            None => println!("{id} is up to date"),
        }
        Ok(())
    }

    async fn sync_all(&self, mode: ShuffleMode, yes: bool) -> Result<()> {
        if !yes {
            let totals = self.megalists.preview_all(&self.owner_id).await?;
            println!("{} megalists: {}", totals.previewed, describe(totals.counts));
            if !confirm("Apply?")? {
                println!("Nothing changed.");
                return Ok(());
            }
        }

        let report = self.megalists.sync_all(&self.owner_id, mode).await?;
        for (id, outcome) in &report.synced {
            if let Some(applied) = outcome.report {
                println!("{id}: +{} -{}", applied.added, applied.removed);
            }
        }
        for (id, e) in &report.failed {
            println!("{id}: failed: {e}");
        }
        println!(
            "{} synced, {} failed, {} skipped",
            report.synced.len(),
            report.failed.len(),
            report.skipped.len()
        );

        if !report.is_success() {
            anyhow::bail!("{} megalist(s) failed to sync", report.failed.len());
        }
        Ok(())
    }

    /// Run the poller until newly created playlists settle, then store what
    /// it saw.
    async fn wait_for_settle(&self) {
        let poller = self.megalists.poller();
        if poller.tracked_count() == 0 {
            return;
        }

        let handle = self.megalists.start_poller();
        let limit = self.poll.timeout + self.poll.interval * 2;
        let settled = tokio::time::timeout(limit, async {
            while poller.tracked_count() > 0 {
                tokio::time::sleep(self.poll.interval).await;
            }
        })
        .await;
        handle.abort();

        if settled.is_err() {
            warn!("Playlists still settling after {limit:?}");
        }
        let updated = self.megalists.apply_poller_events();
        info!("Refreshed {updated} megalist(s) from the service");
    }
}

const fn shuffle_mode(shuffle: bool) -> ShuffleMode {
    if shuffle {
        ShuffleMode::Shuffle
    } else {
        ShuffleMode::Keep
    }
}

fn describe(counts: PreviewCounts) -> String {
    format!("+{} -{}", counts.added, counts.removed)
}

fn print_record(record: &Megalist) {
    let mut flags = Vec::new();
    if record.is_frozen {
        flags.push("frozen");
    }
    if record.is_isolated {
        flags.push("isolated");
    }

    println!(
        "{}  {:<8}  {:>5} tracks  {}{}",
        record.id,
        record.kind.as_str(),
        record.track_count,
        record.name,
        if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        }
    );
    if !record.source_playlist_ids.is_empty() {
        println!("    sources: {}", record.source_playlist_ids.join(", "));
    }
}

/// Ask a yes/no question on the terminal. Anything but "y"/"yes" is no.
fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

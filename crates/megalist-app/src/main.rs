//! # Megalist
//!
//! Merge playlists into megalists and keep them in sync with their sources.

mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use commands::App;
use config::Settings;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str =
    "megalist=info,megalist_engine=info,megalist_registry=warn,megalist_client=warn";
const VERBOSE_FILTER: &str =
    "megalist=debug,megalist_engine=debug,megalist_registry=debug,megalist_client=debug";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    debug!("Starting Megalist v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply_cli(&cli);

    let app = App::connect(&settings, cli.token.clone()).await?;
    app.run(cli.command).await
}

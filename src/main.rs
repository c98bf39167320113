mod cli;
mod config;
mod error;
mod input;
mod orchestrator;
mod pipeline;
mod snapshot;
mod ui;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, UrlSource};
use config::ArchiverConfig;
use error::ArchiveError;
use orchestrator::Archiver;
use pipeline::Renderer;
use snapshot::SnapshotClient;
use ui::TerminalProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress bars are the primary human channel; logs stay quiet unless
    // asked for. RUST_LOG overrides both.
    let default_filter = if cli.verbose {
        "pagevault=debug"
    } else {
        "pagevault=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ArchiverConfig::load(cli.config.as_deref())?;
    cli.command.apply_overrides(&mut config);

    match cli.command {
        Command::Archive { source, json, .. } => run_archive(&config, &source, json).await,
        Command::Check { .. } => run_check(&config).await,
        Command::Snapshot { source } => {
            let urls = collect_urls(&source)?;
            run_snapshot(&config, &urls).await
        }
    }
}

async fn run_archive(config: &ArchiverConfig, source: &UrlSource, json: bool) -> Result<()> {
    let urls = collect_urls(source)?;
    let settings = config.pipeline_settings()?;
    println!("• URLs to archive: {}", urls.len());

    let archiver = Archiver::with_observer(
        config.command_renderer(),
        Arc::new(TerminalProgress::new()),
    );
    let report = archiver.archive_all(&urls, &settings).await?;

    if json {
        ui::print_json(&report);
    } else {
        ui::print_summary(&report);
    }

    if !report.tool_available {
        let reason = report.tool_error.unwrap_or_default();
        return Err(ArchiveError::ToolUnavailable(reason).into());
    }

    if config.snapshot {
        run_snapshot(config, &urls).await?;
    }
    Ok(())
}

async fn run_check(config: &ArchiverConfig) -> Result<()> {
    let renderer = config.command_renderer();
    let version = renderer.check().await?;
    println!("✓ {} is available: {version}", renderer.program());
    Ok(())
}

async fn run_snapshot(config: &ArchiverConfig, urls: &[String]) -> Result<()> {
    let client = SnapshotClient::new(Duration::from_secs(config.snapshot_timeout_secs))?;
    let report = client.snapshot_all(urls, &config.output_dir).await;
    info!(
        saved = report.saved.len(),
        failed = report.failed.len(),
        "snapshot pass finished"
    );
    ui::print_snapshot_summary(&report);
    Ok(())
}

/// Positional URLs followed by the ones from `--file`, with repeats removed.
fn collect_urls(source: &UrlSource) -> Result<Vec<String>, ArchiveError> {
    let mut urls = source.urls.clone();
    if let Some(path) = &source.file {
        urls.extend(input::load_urls(path)?);
    }
    let urls = input::dedupe(urls);
    if urls.is_empty() {
        return Err(ArchiveError::NoUrls);
    }
    Ok(urls)
}

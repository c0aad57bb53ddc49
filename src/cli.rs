//! CLI commands for pitwall.
//!
//! Each pipeline stage is a subcommand: fetch stats, score them, curate
//! document references, and build the combined report.

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing::info;

use crate::config::AppConfig;
use crate::docs;
use crate::fetch;
use crate::openf1::OpenF1Client;
use crate::report::build_report;
use crate::scoring::score_all;
use crate::store::csv_cache;
use crate::store::excel;
use crate::store::StatsCache;
use crate::types::{DriverSessionStat, FiaDocument, ScoredDriverStat};

#[derive(Parser)]
#[command(name = "pitwall")]
#[command(version, about = "F1 driver performance ratings and upgrade report", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch per-driver race stats from the OpenF1 API into the local cache
    Fetch {
        /// First season to fetch; the loop runs through the current year
        #[arg(long)]
        start_year: Option<i32>,
    },

    /// Recompute normalized and weighted scores from the stats cache
    Score,

    /// Curate FIA document references and download missing PDFs
    Docs {
        /// Skip the interactive prompt and only download missing PDFs
        #[arg(long)]
        download_only: bool,
    },

    /// Build the combined performance and upgrade report
    Report,
}

/// Incrementally fetch driver stats, resuming from the cache.
pub async fn run_fetch(start_year: Option<i32>) -> Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(year) = start_year {
        config.api.start_year = year;
    }

    let client = OpenF1Client::new(
        &config.api.base_url,
        config.api.request_delay_secs,
        config.api.timeout_secs,
    )?;
    let mut cache = StatsCache::load(Path::new(&config.paths.driver_stats))?;

    let current_year = Utc::now().year();
    fetch::run_fetch(&client, &mut cache, config.api.start_year, current_year).await
}

/// Regenerate the scored table from the stats cache.
pub fn run_score() -> Result<()> {
    let config = AppConfig::load()?;
    let stats_path = Path::new(&config.paths.driver_stats);

    let rows: Vec<DriverSessionStat> = csv_cache::load(stats_path)
        .with_context(|| format!("No driver stats cache at {}; run fetch first", stats_path.display()))?;
    info!("Loaded driver stats: {} rows", rows.len());

    let scored = score_all(&rows)?;
    info!("Scored {} rows", scored.len());

    let perf_path = Path::new(&config.paths.driver_perf);
    csv_cache::write(perf_path, &scored)?;
    info!("Saved scored stats to {}", perf_path.display());
    Ok(())
}

/// Curate document references, then download any missing PDFs.
pub async fn run_docs(download_only: bool) -> Result<()> {
    let config = AppConfig::load()?;
    let docs_path = Path::new(&config.paths.fia_docs);

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.api.timeout_secs))
        .build()?;

    let docs_dir = Path::new(&config.paths.docs_dir);
    if !download_only {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        return docs::curate_and_download(&mut input, &http, docs_path, docs_dir).await;
    }

    let documents: Vec<FiaDocument> = csv_cache::load_or_empty(docs_path)?;
    docs::download_missing(&http, &documents, docs_dir).await
}

/// Build the combined report from the scored cache, the upgrade workbook,
/// and the curated document references.
pub fn run_report() -> Result<()> {
    let config = AppConfig::load()?;
    let perf_path = Path::new(&config.paths.driver_perf);

    let scored: Vec<ScoredDriverStat> = csv_cache::load(perf_path)
        .with_context(|| format!("No scored cache at {}; run score first", perf_path.display()))?;
    info!("Loaded scored stats: {} rows", scored.len());

    let events = excel::read_upgrade_events(Path::new(&config.paths.upgrades_file))?;
    let documents: Vec<FiaDocument> =
        csv_cache::load_or_empty(Path::new(&config.paths.fia_docs))?;
    info!("Loaded {} curated documents", documents.len());

    let report = build_report(&scored, &events, &documents)?;
    excel::write_report(Path::new(&config.paths.report_file), &report)
}

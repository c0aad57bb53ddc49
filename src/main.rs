//! pitwall
//!
//! Fetches F1 session telemetry from the OpenF1 API, scores each driver's
//! race performance, and joins the scores with car-upgrade disclosures
//! into a combined report.

mod cli;
mod config;
mod docs;
mod fetch;
mod openf1;
mod report;
mod scoring;
mod store;
mod teams;
mod types;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitwall=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch { start_year } => cli::run_fetch(start_year).await,
        Commands::Score => cli::run_score(),
        Commands::Docs { download_only } => cli::run_docs(download_only).await,
        Commands::Report => cli::run_report(),
    }
}

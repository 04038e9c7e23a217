//! Boundary ingest pipeline.
//!
//! Downloads administrative boundaries per country and level and upserts
//! them into the on-disk boundary store.

mod config;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use georesolve::boundaries::{BoundaryIngestor, HttpBoundarySource, ImportReport};
use georesolve::store::{BoundaryStore, SledBoundaryStore};

use crate::config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Import administrative boundaries into the boundary store")]
struct Args {
    /// TOML config file
    #[arg(short, long, default_value = "georesolve.toml")]
    config: PathBuf,

    /// Country to import (alpha-2 or alpha-3); overrides the config list
    #[arg(long = "country")]
    countries: Vec<String>,

    /// Create the store schema before importing
    #[arg(long)]
    init_schema: bool,

    /// Also import ADM0 country outlines
    #[arg(long)]
    include_adm0: bool,

    /// Maximum countries imported at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write the import reports as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = Config::load_from_file(&args.config)
        .with_context(|| format!("Loading {}", args.config.display()))?;

    let codes: Vec<String> = if args.countries.is_empty() {
        config.countries.iter().map(|c| c.code.clone()).collect()
    } else {
        args.countries.clone()
    };
    if codes.is_empty() {
        anyhow::bail!("No countries to import; pass --country or list them in the config");
    }

    info!("Georesolve Boundary Ingest");
    info!("Store: {}", config.global.store_path.display());
    info!("Cache: {}", config.global.cache_dir.display());

    let store = Arc::new(
        SledBoundaryStore::open(&config.global.store_path).context("Failed to open boundary store")?,
    );
    if args.init_schema {
        store.init_schema()?;
        info!("Boundary schema initialised");
    }

    let source = Arc::new(HttpBoundarySource::new(&config.ingest_settings())?);
    let ingestor =
        BoundaryIngestor::new(store.clone(), source).with_country_outline(args.include_adm0);
    let concurrency = args.concurrency.unwrap_or(config.global.max_concurrent);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Importing {} countries", codes.len()));
    pb.enable_steady_tick(Duration::from_millis(200));

    let results = ingestor
        .import_countries(&codes, &config.global.cache_dir, concurrency)
        .await;

    pb.finish_with_message("Import complete");
    store.flush()?;

    let mut reports: Vec<ImportReport> = Vec::new();
    let mut failed = 0usize;
    for (code, result) in results {
        match result {
            Ok(report) => {
                log_report(&report);
                if !report.success {
                    failed += 1;
                }
                reports.push(report);
            }
            Err(e) => {
                error!("{}: {}", code, e);
                failed += 1;
            }
        }
    }

    for (level, count) in store.count_by_level()? {
        info!("{}: {} boundaries", level, count);
    }

    if let Some(path) = &args.report {
        let file = File::create(path).with_context(|| format!("Creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, &reports)?;
        info!("Report written to {}", path.display());
    }

    if failed > 0 {
        anyhow::bail!("{} of {} country imports failed", failed, codes.len());
    }
    Ok(())
}

fn log_report(report: &ImportReport) {
    let levels: Vec<&str> = report.levels_imported.iter().map(|l| l.code()).collect();
    info!(
        "{}: levels [{}], {} features, {} inserted, {} updated",
        report.country,
        levels.join(", "),
        report.processed,
        report.inserted,
        report.updated
    );

    for err in report.errors.iter().take(10) {
        warn!(
            "{} {} {}: {}{}",
            report.country,
            err.level.map(|l| l.code()).unwrap_or("-"),
            err.name.as_deref().unwrap_or("<unnamed>"),
            err.message,
            err.shape
                .as_ref()
                .map(|s| format!(" [{}]", s))
                .unwrap_or_default()
        );
    }
    if report.errors.len() > 10 {
        warn!("{}: {} more errors", report.country, report.errors.len() - 10);
    }
}

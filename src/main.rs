//! # Daily Horoscopes
//!
//! Scrapes the daily horoscope of every zodiac sign in many languages, keeps
//! the latest record per language, sign and day in SQLite, and serves it over
//! a small HTTP API.
//!
//! ## Usage
//!
//! ```sh
//! daily_horoscopes scrape --export-dir ./json
//! daily_horoscopes serve --bind 0.0.0.0:5001
//! ```
//!
//! ## Architecture
//!
//! A scrape run follows a pipeline:
//! 1. **Tasks**: one per (language, sign) from the language catalogue
//! 2. **Scheduling**: at most `--concurrency` pages in flight, each with its
//!    own browsing session
//! 3. **Retry**: up to `--max-attempts` loads per page, spaced by a fixed delay
//! 4. **Sink**: every outcome is upserted and folded into a per-language
//!    snapshot; failures are stored as placeholders
//! 5. **Export**: `horoscopes_<language>.json` written from the snapshot

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod retry;
mod scheduler;
mod scrapers;
mod server;
mod store;
mod utils;

#[cfg(test)]
mod test_support;

use cli::{Cli, Command, ScrapeArgs, ServeArgs};
use config::Catalogue;
use pipeline::{Capabilities, run_batch};
use scrapers::{AstrosageExtractor, HttpFetcher};
use server::AppState;
use store::SqliteStore;
use utils::{ensure_writable_dir, today_utc};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let Cli {
        database,
        config,
        command,
    } = Cli::parse();
    debug!(database = %database.display(), ?config, "Parsed CLI arguments");

    let catalogue = Catalogue::load(config.as_deref())?;

    match command {
        Command::Scrape(args) => scrape(catalogue, &database, args).await,
        Command::Serve(args) => serve(catalogue, &database, args).await,
    }
}

#[instrument(level = "info", skip_all, fields(database = %database.display()))]
async fn scrape(
    catalogue: Catalogue,
    database: &Path,
    args: ScrapeArgs,
) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    info!("daily_horoscopes scrape starting up");

    let catalogue = catalogue.restrict_to(&args.languages)?;
    let settings = args.settings();

    // Early check: the export directory must be writable before any page is fetched
    if let Some(dir) = &settings.export_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Export directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    let store = Arc::new(SqliteStore::open(database).await?);
    let fetcher = Arc::new(HttpFetcher::new(&args.user_agent)?);
    let day = today_utc();

    let outcome = run_batch(
        &catalogue,
        &settings,
        Capabilities {
            fetcher,
            extractor: Arc::new(AstrosageExtractor),
            store: store.clone(),
        },
        day,
    )
    .await;

    let report = &outcome.report;
    match store.count_for_day(day).await {
        Ok(stored) => info!(%day, stored, "Records stored for today"),
        Err(e) => warn!(%day, error = %e, "Could not count today's records"),
    }
    for path in &outcome.exported {
        info!(path = %path.display(), "Export written");
    }

    let elapsed = start_time.elapsed();
    info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        retried = report.retried,
        persisted = report.persisted,
        persist_errors = report.persist_errors,
        snapshot_entries = outcome.snapshot.len(),
        elapsed_secs = elapsed.as_secs_f64(),
        "Scrape run completed"
    );

    store.close().await;
    Ok(())
}

#[instrument(level = "info", skip_all, fields(database = %database.display(), bind = %args.bind))]
async fn serve(
    catalogue: Catalogue,
    database: &Path,
    args: ServeArgs,
) -> Result<(), Box<dyn Error>> {
    let store = Arc::new(SqliteStore::open(database).await?);
    let state = AppState::new(store.clone(), catalogue.language_names());
    server::serve(state, args.bind).await?;
    store.close().await;
    Ok(())
}

//! One scrape run, end to end.
//!
//! 1. **Tasks**: one per configured language and sign
//! 2. **Scheduling**: bounded-concurrency execution with retries
//! 3. **Sink**: every record is saved and folded into the snapshot as it arrives
//! 4. **Export**: optional `horoscopes_<language>.json` files

use crate::aggregator::{Aggregator, RunReport, Snapshot};
use crate::config::{Catalogue, ScrapeSettings};
use crate::outputs::json;
use crate::retry::RetryingExecutor;
use crate::scheduler::Scheduler;
use crate::scrapers::{Extractor, Fetcher};
use crate::store::HoroscopeStore;
use chrono::NaiveDate;
use futures::StreamExt;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Collaborators of a run.
pub struct Capabilities {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub store: Arc<dyn HoroscopeStore>,
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub snapshot: Snapshot,
    pub report: RunReport,
    /// Export files written; empty when export is disabled or failed.
    pub exported: Vec<PathBuf>,
}

/// Scrape every task of `catalogue` for `day`.
#[instrument(level = "info", skip_all, fields(%day, concurrency = settings.concurrency))]
pub async fn run_batch(
    catalogue: &Catalogue,
    settings: &ScrapeSettings,
    capabilities: Capabilities,
    day: NaiveDate,
) -> RunOutcome {
    let Capabilities {
        fetcher,
        extractor,
        store,
    } = capabilities;

    let tasks = catalogue.tasks();
    let executor = Arc::new(RetryingExecutor::new(
        fetcher,
        extractor,
        Arc::clone(&store),
        settings.retry,
        day,
    ));
    let scheduler = Scheduler::new(executor, settings.concurrency);
    info!(
        tasks = tasks.len(),
        concurrency = scheduler.concurrency(),
        "Starting run"
    );
    let mut sink = Aggregator::new(store, day, catalogue.language_names());

    let mut records = pin!(scheduler.run(tasks));
    while let Some(record) = records.next().await {
        sink.accept(record).await;
    }
    let (snapshot, report) = sink.finish();

    let exported = match &settings.export_dir {
        Some(dir) => match json::write_snapshot(&snapshot, dir).await {
            Ok(paths) => paths,
            Err(e) => {
                error!(error = %e, "Failed to write export files");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    RunOutcome {
        snapshot,
        report,
        exported,
    }
}

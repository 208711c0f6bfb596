//! Aggregator: consumes result records as they arrive, writes each to the
//! store and folds it into the per-language snapshot used for bulk export.
//!
//! Records the executor already saved are not written again. Store errors are
//! logged and counted; they never stop the run.

use crate::models::{ExtractedFields, ResultRecord};
use crate::store::HoroscopeStore;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Language to sign to payload, for one run.
///
/// Permanently failed signs hold the placeholder payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, BTreeMap<String, ExtractedFields>>);

impl Snapshot {
    /// A snapshot with an empty entry for each language.
    pub fn with_languages<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            languages
                .into_iter()
                .map(|l| (l.into(), BTreeMap::new()))
                .collect(),
        )
    }

    /// Add one record. A record for an already present sign replaces it.
    pub fn fold(&mut self, record: &ResultRecord) {
        self.0
            .entry(record.language.clone())
            .or_default()
            .insert(record.sign.clone(), record.payload.clone());
    }

    #[cfg(test)]
    pub fn language(&self, language: &str) -> Option<&BTreeMap<String, ExtractedFields>> {
        self.0.get(language)
    }

    pub fn languages(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, ExtractedFields>)> {
        self.0.iter().map(|(name, signs)| (name.as_str(), signs))
    }

    /// Number of sign entries across all languages.
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records that needed more than one attempt.
    pub retried: usize,
    /// Records known to be in the store, whoever wrote them.
    pub persisted: usize,
    pub persist_errors: usize,
}

/// Sink for the records of one run.
pub struct Aggregator {
    store: Arc<dyn HoroscopeStore>,
    day: NaiveDate,
    snapshot: Snapshot,
    report: RunReport,
}

impl Aggregator {
    /// `languages` are pre-seeded so that each gets an export file.
    pub fn new<I, S>(store: Arc<dyn HoroscopeStore>, day: NaiveDate, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            day,
            snapshot: Snapshot::with_languages(languages),
            report: RunReport::default(),
        }
    }

    /// Handle one terminal record. Called exactly once per record.
    #[instrument(level = "debug", skip_all, fields(language = %record.language, sign = %record.sign))]
    pub async fn accept(&mut self, record: ResultRecord) {
        self.report.total += 1;
        if record.is_success() {
            self.report.succeeded += 1;
        } else {
            self.report.failed += 1;
            warn!(
                attempts = record.attempts,
                reason = record.failure_reason.as_deref().unwrap_or("unknown"),
                "Storing placeholder for failed sign"
            );
        }
        if record.attempts > 1 {
            self.report.retried += 1;
        }

        if record.persisted {
            self.report.persisted += 1;
        } else {
            let key = record.key(self.day);
            match self.store.upsert(&key, record.status, &record.payload).await {
                Ok(()) => {
                    self.report.persisted += 1;
                    debug!(status = record.status.as_str(), "Saved to store");
                }
                Err(e) => {
                    self.report.persist_errors += 1;
                    error!(error = %e, "Failed to save record; continuing");
                }
            }
        }

        self.snapshot.fold(&record);
    }

    /// Finalize the run.
    pub fn finish(self) -> (Snapshot, RunReport) {
        (self.snapshot, self.report)
    }
}

//! Retrying executor: runs one task to a single terminal [`ResultRecord`].
//!
//! Each task walks a small state machine:
//!
//! ```text
//! Pending -> Attempting(1) -> Success
//!                          -> Attempting(2) -> ... -> Success | PermanentFailure
//! ```
//!
//! [`AttemptState::next`] is the pure transition function; the executor only
//! performs the side effects (open a session, load, extract, close, wait)
//! and feeds the outcome back as an [`AttemptEvent`].
//!
//! # Retry Strategy
//!
//! - Up to `max_attempts` attempts (3 by default)
//! - Constant delay between attempts (2 s by default), none after the last
//! - Every attempt gets a fresh session, closed on success and on error
//! - Each navigation is bounded by the policy's timeout (45 s by default)

use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::models::{ExtractedFields, NaturalKey, ResultRecord, Task};
use crate::scrapers::{Extractor, Fetcher, Session};
use crate::store::HoroscopeStore;
use crate::utils::truncate_for_log;
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

/// Where a task is in its attempt sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptState {
    Pending,
    /// Running attempt number `n` (1-based).
    Attempting(u32),
    Success {
        attempts: u32,
        payload: ExtractedFields,
    },
    PermanentFailure {
        attempts: u32,
        reason: String,
    },
}

/// What happened, fed into [`AttemptState::next`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptEvent {
    Start,
    Succeeded(ExtractedFields),
    Failed(String),
}

impl AttemptState {
    /// Transition for `event` under an attempt budget of `max_attempts`.
    ///
    /// Terminal states never change, and events that make no sense in the
    /// current state leave it as is.
    pub fn next(self, event: AttemptEvent, max_attempts: u32) -> AttemptState {
        match (self, event) {
            (AttemptState::Pending, AttemptEvent::Start) => AttemptState::Attempting(1),
            (AttemptState::Attempting(n), AttemptEvent::Succeeded(payload)) => {
                AttemptState::Success {
                    attempts: n,
                    payload,
                }
            }
            (AttemptState::Attempting(n), AttemptEvent::Failed(reason)) => {
                if n >= max_attempts {
                    AttemptState::PermanentFailure {
                        attempts: n,
                        reason,
                    }
                } else {
                    AttemptState::Attempting(n + 1)
                }
            }
            (state, _) => state,
        }
    }
}

/// Runs tasks with retries and reports exactly one record per task.
///
/// Successful results are written to the store as soon as they are known,
/// so a crash later in the run does not lose them.
pub struct RetryingExecutor {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn HoroscopeStore>,
    policy: RetryPolicy,
    day: NaiveDate,
}

impl fmt::Debug for RetryingExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingExecutor")
            .field("policy", &self.policy)
            .field("day", &self.day)
            .finish()
    }
}

impl RetryingExecutor {
    /// `day` is the day stamp used for every record of the run.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn HoroscopeStore>,
        policy: RetryPolicy,
        day: NaiveDate,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            policy,
            day,
        }
    }

    /// Run `task` to completion. Never fails: errors end up in the record.
    #[instrument(level = "info", skip_all, fields(language = %task.language, sign = %task.sign))]
    pub async fn execute(&self, task: &Task) -> ResultRecord {
        let max = self.policy.max_attempts.max(1);
        let total_t0 = Instant::now();
        let mut state = AttemptState::Pending.next(AttemptEvent::Start, max);

        loop {
            state = match state {
                AttemptState::Pending => AttemptState::Pending.next(AttemptEvent::Start, max),
                AttemptState::Attempting(attempt) => {
                    if attempt > 1 {
                        sleep(self.policy.retry_delay).await;
                    }
                    debug!(attempt, max, url = %task.url, "Starting attempt");
                    let attempt_t0 = Instant::now();
                    let event = match self.attempt(task).await {
                        Ok(payload) => AttemptEvent::Succeeded(payload),
                        Err(e) => {
                            let reason = e.to_string();
                            if attempt < max {
                                warn!(
                                    attempt,
                                    max,
                                    elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                                    delay_ms = self.policy.retry_delay.as_millis() as u64,
                                    error = %truncate_for_log(&reason, 300),
                                    "Attempt failed; retrying after delay"
                                );
                            }
                            AttemptEvent::Failed(reason)
                        }
                    };
                    AttemptState::Attempting(attempt).next(event, max)
                }
                AttemptState::Success { attempts, payload } => {
                    if payload.is_placeholder() {
                        warn!(url = %task.url, "Page loaded but no field was found; layout may have changed");
                    }
                    info!(
                        attempts,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "Scraped"
                    );
                    let mut record = ResultRecord::success(task, payload, attempts);
                    record.persisted = self.persist_early(&record).await;
                    return record;
                }
                AttemptState::PermanentFailure { attempts, reason } => {
                    error!(
                        attempts,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        error = %truncate_for_log(&reason, 300),
                        "All attempts failed; giving up"
                    );
                    return ResultRecord::permanent_failure(task, reason, attempts);
                }
            };
        }
    }

    /// One attempt: open a session, load and extract, always close.
    async fn attempt(&self, task: &Task) -> Result<ExtractedFields> {
        let mut session = self.fetcher.open_session().await?;
        let outcome = self.load_and_extract(session.as_mut(), task).await;
        session.close().await;
        outcome
    }

    async fn load_and_extract(
        &self,
        session: &mut dyn Session,
        task: &Task,
    ) -> Result<ExtractedFields> {
        let limit = self.policy.navigation_timeout;
        let page = timeout(limit, session.navigate(&task.url, limit))
            .await
            .map_err(|_| Error::Timeout {
                url: task.url.clone(),
                timeout: limit,
            })??;
        self.extractor.extract(&page, &task.labels)
    }

    /// Write a success right away. Returns whether the write went through;
    /// a failed write is left to the sink.
    async fn persist_early(&self, record: &ResultRecord) -> bool {
        let key: NaturalKey = record.key(self.day);
        match self.store.upsert(&key, record.status, &record.payload).await {
            Ok(()) => {
                debug!("Saved to store");
                true
            }
            Err(e) => {
                warn!(error = %e, "Early save failed; sink will retry the write");
                false
            }
        }
    }
}

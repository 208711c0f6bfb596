//! Bounded scheduler: runs every task through the [`RetryingExecutor`] with at
//! most `concurrency` executions in flight.
//!
//! Tasks are admitted in input order; once `concurrency` executions are
//! running, the next task waits until one of them completes. Records come out
//! in completion order, one per task.
//!
//! Executions are driven by a background task and records are handed over
//! through an unbounded channel, so a slow consumer never holds up running
//! executions or the admission of queued tasks.

use crate::models::{ResultRecord, Task};
use crate::retry::RetryingExecutor;
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, instrument};

#[derive(Debug, Clone)]
pub struct Scheduler {
    executor: Arc<RetryingExecutor>,
    concurrency: usize,
}

impl Scheduler {
    /// A ceiling of 0 is treated as 1.
    pub fn new(executor: Arc<RetryingExecutor>, concurrency: usize) -> Self {
        Self {
            executor,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Stream the record of every task as it completes.
    ///
    /// Must be called within a Tokio runtime. Dropping the stream stops
    /// admitting further tasks.
    #[instrument(level = "info", skip_all, fields(tasks = tasks.len(), concurrency = self.concurrency))]
    pub fn run(&self, tasks: Vec<Task>) -> impl Stream<Item = ResultRecord> + use<> {
        info!("Scheduling tasks");
        let executor = Arc::clone(&self.executor);
        let concurrency = self.concurrency;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(
            async move {
                let mut records = stream::iter(tasks)
                    .map(move |task| {
                        let executor = Arc::clone(&executor);
                        async move { executor.execute(&task).await }
                    })
                    .buffer_unordered(concurrency);
                while let Some(record) = records.next().await {
                    if tx.send(record).is_err() {
                        debug!("Record consumer went away; stopping");
                        break;
                    }
                }
            }
            .in_current_span(),
        );

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|record| (record, rx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::scrapers::AstrosageExtractor;
    use crate::test_support::{ScriptedFetcher, sample_page, sqlite_store, task};
    use chrono::NaiveDate;
    use futures::FutureExt;
    use std::collections::HashSet;
    use std::pin::pin;
    use std::time::Duration;

    fn tasks(n: usize) -> Vec<Task> {
        (0..n).map(|i| task("english", &format!("sign{i}"))).collect()
    }

    fn fetcher_for(tasks: &[Task]) -> ScriptedFetcher {
        tasks
            .iter()
            .fold(ScriptedFetcher::new(), |f, t| f.page(&t.url, sample_page(&t.sign)))
            .latency(Duration::from_millis(20))
    }

    async fn run(
        fetcher: Arc<ScriptedFetcher>,
        tasks: Vec<Task>,
        concurrency: usize,
    ) -> Vec<ResultRecord> {
        let (store, _dir) = sqlite_store().await;
        let policy = RetryPolicy {
            max_attempts: 2,
            retry_delay: Duration::from_millis(5),
            navigation_timeout: Duration::from_secs(5),
        };
        let executor = Arc::new(RetryingExecutor::new(
            fetcher,
            Arc::new(AstrosageExtractor),
            store,
            policy,
            NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
        ));
        Scheduler::new(executor, concurrency)
            .run(tasks)
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_ceiling() {
        let input = tasks(10);
        let fetcher = Arc::new(fetcher_for(&input));

        let records = run(fetcher.clone(), input, 3).await;

        assert_eq!(records.len(), 10);
        assert_eq!(fetcher.peak_sessions(), 3);
        assert_eq!(fetcher.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_ceiling_of_one_is_sequential() {
        let input = tasks(4);
        let fetcher = Arc::new(fetcher_for(&input));

        let records = run(fetcher.clone(), input, 1).await;

        assert_eq!(records.len(), 4);
        assert_eq!(fetcher.peak_sessions(), 1);
    }

    #[tokio::test]
    async fn test_ceiling_above_task_count_runs_everything_at_once() {
        let input = tasks(5);
        let fetcher = Arc::new(fetcher_for(&input));

        let records = run(fetcher.clone(), input, 16).await;

        assert_eq!(records.len(), 5);
        assert_eq!(fetcher.peak_sessions(), 5);
    }

    #[tokio::test]
    async fn test_one_record_per_task_including_failures() {
        let input = tasks(6);
        let broken = input[2].url.clone();
        let fetcher = Arc::new(fetcher_for(&input).fail_first(&broken, u32::MAX));

        let records = run(fetcher.clone(), input.clone(), 2).await;

        let signs: HashSet<_> = records.iter().map(|r| r.sign.clone()).collect();
        let expected: HashSet<_> = input.iter().map(|t| t.sign.clone()).collect();
        assert_eq!(records.len(), 6);
        assert_eq!(signs, expected);
        assert_eq!(records.iter().filter(|r| !r.is_success()).count(), 1);
        assert_eq!(fetcher.calls(&broken), 2);
    }

    #[tokio::test]
    async fn test_slow_consumer_does_not_stall_running_executions() {
        let fast = task("english", "aries");
        let slow = task("english", "leo");
        // leo needs five attempts: about 5 * 30 ms of loading and 4 * 60 ms of delay
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .page(&fast.url, sample_page("fast"))
                .page(&slow.url, sample_page("slow"))
                .fail_first(&slow.url, 4)
                .latency(Duration::from_millis(30)),
        );
        let (store, _dir) = sqlite_store().await;
        let executor = Arc::new(RetryingExecutor::new(
            fetcher.clone(),
            Arc::new(AstrosageExtractor),
            store,
            RetryPolicy {
                max_attempts: 6,
                retry_delay: Duration::from_millis(60),
                navigation_timeout: Duration::from_secs(5),
            },
            NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
        ));
        let mut records = pin!(Scheduler::new(executor, 2).run(vec![fast, slow]));

        let first = records.next().await.unwrap();
        assert_eq!(first.sign, "aries");

        // consumer busy for longer than leo's whole retry chain
        tokio::time::sleep(Duration::from_millis(800)).await;

        let second = records
            .next()
            .now_or_never()
            .flatten()
            .expect("leo finished while the consumer was busy");
        assert_eq!(second.sign, "leo");
        assert!(second.is_success());
        assert_eq!(second.attempts, 5);
        assert!(records.next().await.is_none());
        assert_eq!(fetcher.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_yields_nothing() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        assert!(run(fetcher, Vec::new(), 4).await.is_empty());
    }

    #[test]
    fn test_zero_ceiling_is_clamped() {
        let executor = Arc::new(RetryingExecutor::new(
            Arc::new(ScriptedFetcher::new()),
            Arc::new(AstrosageExtractor),
            crate::test_support::failing_store(),
            RetryPolicy::default(),
            NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
        ));
        assert_eq!(Scheduler::new(executor, 0).concurrency(), 1);
    }
}

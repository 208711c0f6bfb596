//! Test doubles shared by the unit tests.

use crate::error::{Error, Result};
use crate::models::{ExtractedFields, Labels, NaturalKey, Status, StoredHoroscope, Task};
use crate::scrapers::{AstrosageExtractor, Extractor, Fetcher, Page, Session};
use crate::store::{HoroscopeStore, SqliteStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A task for `language`/`sign` pointing at a fake URL.
pub fn task(language: &str, sign: &str) -> Task {
    Task {
        language: language.to_string(),
        sign: sign.to_string(),
        url: format!("https://horoscopes.test/{language}/{sign}.asp"),
        labels: Arc::new(Labels {
            lucky_number: vec!["Lucky Number".to_string()],
            lucky_color: vec!["Lucky Color".to_string()],
            remedy: vec!["Remedy".to_string()],
        }),
    }
}

/// A minimal page in the AstroSage layout with `text` as the forecast.
pub fn sample_page(text: &str) -> String {
    format!(
        r#"<html><body>
<div class="ui-large-content">{text}</div>
<div class="ui-large-content"><b>Lucky Number :-</b> 3</div>
<div class="ui-large-content"><b>Lucky Color :-</b> Green</div>
<div class="col-sm-4"><b>Health:</b><img src="/img/star2.gif"></div>
</body></html>"#
    )
}

/// A fresh SQLite store in a temporary directory.
pub async fn sqlite_store() -> (Arc<SqliteStore>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("test.db")).await.unwrap();
    (Arc::new(store), dir)
}

/// A store whose writes and reads always fail.
pub fn failing_store() -> Arc<dyn HoroscopeStore> {
    Arc::new(FailingStore)
}

struct FailingStore;

#[async_trait]
impl HoroscopeStore for FailingStore {
    async fn upsert(&self, _: &NaturalKey, _: Status, _: &ExtractedFields) -> Result<()> {
        Err(Error::Database(sqlx::Error::PoolClosed))
    }

    async fn find_one(&self, _: &NaturalKey) -> Result<Option<StoredHoroscope>> {
        Err(Error::Database(sqlx::Error::PoolClosed))
    }
}

/// Take one from `remaining` if it is not zero.
fn take_one(remaining: &AtomicU32) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Extractor whose first `n` calls fail; later calls parse the page normally.
pub struct FlakyExtractor {
    remaining: AtomicU32,
    calls: AtomicU32,
}

impl FlakyExtractor {
    pub const MESSAGE: &'static str = "unexpected page layout";

    pub fn failing_first(n: u32) -> Self {
        Self {
            remaining: AtomicU32::new(n),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Extractor for FlakyExtractor {
    fn extract(&self, page: &Page, labels: &Labels) -> Result<ExtractedFields> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.remaining) {
            return Err(Error::Extract(Self::MESSAGE.to_string()));
        }
        AstrosageExtractor.extract(page, labels)
    }
}

#[derive(Default)]
struct Counters {
    open: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<HashMap<String, u32>>,
}

/// Fetcher serving canned pages, with scripted failures per URL.
///
/// Tracks open sessions and the highest number open at once, which equals
/// the number of tasks attempting concurrently.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    failures: Arc<Mutex<HashMap<String, u32>>>,
    latency: Duration,
    open_failures: AtomicU32,
    counters: Arc<Counters>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    /// Fail the first `n` navigations to `url`.
    pub fn fail_first(self, url: &str, n: u32) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), n);
        self
    }

    /// Fail the first `n` attempts to open a session.
    pub fn fail_open(mut self, n: u32) -> Self {
        self.open_failures = AtomicU32::new(n);
        self
    }

    /// Delay every navigation by `latency`.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Navigations made to `url` so far.
    pub fn calls(&self, url: &str) -> u32 {
        self.counters
            .calls
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn open_sessions(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    pub fn peak_sessions(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn open_session(&self) -> Result<Box<dyn Session>> {
        if take_one(&self.open_failures) {
            return Err(Error::Fetch("scripted session failure".to_string()));
        }
        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            pages: self.pages.clone(),
            failures: Arc::clone(&self.failures),
            latency: self.latency,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ScriptedSession {
    pages: HashMap<String, String>,
    failures: Arc<Mutex<HashMap<String, u32>>>,
    latency: Duration,
    counters: Arc<Counters>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<Page> {
        *self
            .counters
            .calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let should_fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(url) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            return Err(Error::Fetch(format!("scripted failure for {url}")));
        }

        self.pages
            .get(url)
            .map(|html| Page {
                url: url.to_string(),
                html: html.clone(),
            })
            .ok_or_else(|| Error::Fetch(format!("no page scripted for {url}")))
    }

    async fn close(self: Box<Self>) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

//! HTTP page fetcher.
//!
//! Sessions share one `reqwest::Client` (and so its connection pool); each
//! session performs a single GET of the HTML document. Images, stylesheets,
//! fonts and media referenced by the page are never requested.

use super::{Fetcher, Page, Session};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("daily_horoscopes/", env!("CARGO_PKG_VERSION"));

/// [`Fetcher`] backed by a shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build the shared client. Failing here aborts the run before any task
    /// is scheduled.
    pub fn new(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn open_session(&self) -> Result<Box<dyn Session>> {
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            opened: Instant::now(),
        }))
    }
}

struct HttpSession {
    client: Client,
    opened: Instant,
}

#[async_trait]
impl Session for HttpSession {
    #[instrument(level = "debug", skip(self))]
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Page> {
        let html = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        if html.trim().is_empty() {
            return Err(Error::Fetch(format!("empty document from {url}")));
        }
        debug!(bytes = html.len(), "Loaded page");
        Ok(Page {
            url: url.to_string(),
            html,
        })
    }

    async fn close(self: Box<Self>) {
        debug!(
            elapsed_ms = self.opened.elapsed().as_millis() as u64,
            "Closed HTTP session"
        );
    }
}

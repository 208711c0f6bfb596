//! Page fetching and field extraction.
//!
//! Scraping a horoscope page happens in two steps:
//!
//! 1. **Fetching**: a [`Fetcher`] opens a fresh [`Session`] per attempt, the
//!    session loads the page and is closed again whatever the outcome.
//! 2. **Extraction**: an [`Extractor`] maps the loaded [`Page`] and the
//!    language's labels to [`ExtractedFields`].
//!
//! | Implementation | Module | Notes |
//! |----------------|--------|-------|
//! | [`HttpFetcher`] | [`http`] | Plain HTTP GET of the document only |
//! | [`AstrosageExtractor`] | [`astrosage`] | CSS selectors over the page HTML |

use crate::error::Result;
use crate::models::{ExtractedFields, Labels};
use async_trait::async_trait;
use std::time::Duration;

pub mod astrosage;
pub mod http;

pub use astrosage::AstrosageExtractor;
pub use http::HttpFetcher;

/// A loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// URL the document was loaded from.
    pub url: String,
    /// Raw HTML.
    pub html: String,
}

/// Shared capability that hands out per-attempt sessions.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Acquire a fresh session. The caller must [`Session::close`] it.
    async fn open_session(&self) -> Result<Box<dyn Session>>;
}

/// A session owned by exactly one attempt.
#[async_trait]
pub trait Session: Send {
    /// Load `url`, giving up after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Page>;

    /// Release the session.
    async fn close(self: Box<Self>);
}

/// Maps a loaded page to the record fields.
///
/// Missing elements yield `None` fields, not errors.
pub trait Extractor: Send + Sync {
    fn extract(&self, page: &Page, labels: &Labels) -> Result<ExtractedFields>;
}

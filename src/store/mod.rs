//! Persistence of the latest horoscope per language, sign and day.
//!
//! The store's one write operation is an upsert on the natural key
//! `(language, sign, day)`: re-running a batch on the same day overwrites
//! rows in place and never duplicates them.

use crate::error::Result;
use crate::models::{ExtractedFields, NaturalKey, Status, StoredHoroscope};
use async_trait::async_trait;

mod sqlite;

pub use sqlite::SqliteStore;

#[async_trait]
pub trait HoroscopeStore: Send + Sync {
    /// Insert the record for `key`, or overwrite the existing one.
    async fn upsert(&self, key: &NaturalKey, status: Status, fields: &ExtractedFields)
    -> Result<()>;

    /// The record for `key`, if any.
    async fn find_one(&self, key: &NaturalKey) -> Result<Option<StoredHoroscope>>;
}

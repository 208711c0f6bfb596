//! Data models for scrape tasks, their outcomes and the stored records.
//!
//! - [`Task`]: one (language, sign) unit of fetch-extract work
//! - [`ExtractedFields`]: the fields pulled from a daily horoscope page
//! - [`ResultRecord`]: the single terminal outcome of a task
//! - [`NaturalKey`]: `(language, sign, day)`, the identity of a stored record
//! - [`StoredHoroscope`]: the persisted form, as served by the read API

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Label strings used to recognise the lucky-number, lucky-colour and remedy
/// entries on a page. A page label matches a field when it contains any of the
/// field's strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Labels {
    #[serde(default)]
    pub lucky_number: Vec<String>,
    #[serde(default)]
    pub lucky_color: Vec<String>,
    #[serde(default)]
    pub remedy: Vec<String>,
}

/// One fetch unit: a sign page for a language.
///
/// Tasks are built once per run from the catalogue and never mutated.
#[derive(Debug, Clone)]
pub struct Task {
    /// Language key, e.g. `"hindi"`.
    pub language: String,
    /// Sign (category) key, e.g. `"aries"`.
    pub sign: String,
    /// Absolute URL of the page to load.
    pub url: String,
    /// Labels of the task's language, shared by all of its signs.
    pub labels: Arc<Labels>,
}

/// Fields extracted from one page.
///
/// The all-`None` / empty value ([`ExtractedFields::placeholder`]) stands in
/// for tasks that failed permanently, so consumers never deal with a missing
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub horoscope: Option<String>,
    pub lucky_number: Option<String>,
    pub lucky_color: Option<String>,
    pub remedy: Option<String>,
    /// Rating category to number of filled stars.
    #[serde(default)]
    pub ratings: BTreeMap<String, u32>,
}

impl ExtractedFields {
    /// The payload recorded for a permanently failed task.
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// `true` when every scalar field is `None` and there are no ratings.
    pub fn is_placeholder(&self) -> bool {
        self.horoscope.is_none()
            && self.lucky_number.is_none()
            && self.lucky_color.is_none()
            && self.remedy.is_none()
            && self.ratings.is_empty()
    }
}

/// Terminal status of a task, also persisted with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    PermanentFailure,
}

impl Status {
    /// Column value used by the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::PermanentFailure => "permanent_failure",
        }
    }

    /// Parse a column value written by [`Status::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Status::Success),
            "permanent_failure" => Some(Status::PermanentFailure),
            _ => None,
        }
    }
}

/// The outcome of one task. Exactly one is produced per task per run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub language: String,
    pub sign: String,
    pub status: Status,
    /// Extracted fields, or the placeholder for a permanent failure.
    pub payload: ExtractedFields,
    /// Message of the last error when the task failed permanently.
    pub failure_reason: Option<String>,
    /// Number of attempts made.
    pub attempts: u32,
    /// Set when the executor already wrote this record to the store.
    pub persisted: bool,
}

impl ResultRecord {
    /// A successful outcome after `attempts` attempts.
    pub fn success(task: &Task, payload: ExtractedFields, attempts: u32) -> Self {
        Self {
            language: task.language.clone(),
            sign: task.sign.clone(),
            status: Status::Success,
            payload,
            failure_reason: None,
            attempts,
            persisted: false,
        }
    }

    /// A permanent failure carrying the placeholder payload.
    pub fn permanent_failure(task: &Task, reason: String, attempts: u32) -> Self {
        Self {
            language: task.language.clone(),
            sign: task.sign.clone(),
            status: Status::PermanentFailure,
            payload: ExtractedFields::placeholder(),
            failure_reason: Some(reason),
            attempts,
            persisted: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Natural key of this record for `day`.
    pub fn key(&self, day: NaiveDate) -> NaturalKey {
        NaturalKey::new(&self.language, &self.sign, day)
    }
}

/// Identity of a stored record: one per language, sign and calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub language: String,
    pub sign: String,
    pub day: NaiveDate,
}

impl NaturalKey {
    pub fn new(language: impl Into<String>, sign: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            language: language.into(),
            sign: sign.into(),
            day,
        }
    }

    /// The day as stored, `YYYY-MM-DD`.
    pub fn day_stamp(&self) -> String {
        self.day.format("%Y-%m-%d").to_string()
    }
}

/// A horoscope as persisted and served.
///
/// `status` is kept for the read side to tell placeholders apart; it is not
/// part of the JSON representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredHoroscope {
    pub language: String,
    pub sign: String,
    pub date: String,
    #[serde(skip)]
    pub status: Status,
    pub horoscope: Option<String>,
    pub lucky_number: Option<String>,
    pub lucky_color: Option<String>,
    pub remedy: Option<String>,
    pub ratings: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredHoroscope {
    /// The stored fields in their extracted shape.
    #[cfg(test)]
    pub fn fields(&self) -> ExtractedFields {
        ExtractedFields {
            horoscope: self.horoscope.clone(),
            lucky_number: self.lucky_number.clone(),
            lucky_color: self.lucky_color.clone(),
            remedy: self.remedy.clone(),
            ratings: self.ratings.clone(),
        }
    }
}

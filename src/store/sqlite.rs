//! SQLite-backed [`HoroscopeStore`].

use super::HoroscopeStore;
use crate::error::Result;
use crate::models::{ExtractedFields, NaturalKey, Status, StoredHoroscope};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::{FromRow, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Store handle; cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct HoroscopeRow {
    language: String,
    sign: String,
    date: String,
    status: String,
    horoscope: Option<String>,
    lucky_number: Option<String>,
    lucky_color: Option<String>,
    remedy: Option<String>,
    ratings: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<HoroscopeRow> for StoredHoroscope {
    type Error = crate::error::Error;

    fn try_from(row: HoroscopeRow) -> Result<Self> {
        let status = Status::parse(&row.status).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown status '{}'", row.status).into())
        })?;
        Ok(StoredHoroscope {
            language: row.language,
            sign: row.sign,
            date: row.date,
            status,
            horoscope: row.horoscope,
            lucky_number: row.lucky_number,
            lucky_color: row.lucky_color,
            remedy: row.remedy,
            ratings: serde_json::from_str(&row.ratings)?,
            created_at: DateTime::from_timestamp_millis(row.created_at).unwrap_or_default(),
            updated_at: DateTime::from_timestamp_millis(row.updated_at).unwrap_or_default(),
        })
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply migrations.
    #[instrument(level = "info", fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePool::connect_with(options).await?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Store ready");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut *conn)
            .await?;

        if current.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }
        Ok(())
    }

    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        debug!("Applying schema v1");
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS horoscopes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                language TEXT NOT NULL,
                sign TEXT NOT NULL,
                date TEXT NOT NULL,
                status TEXT NOT NULL,
                horoscope TEXT,
                lucky_number TEXT,
                lucky_color TEXT,
                remedy TEXT,
                ratings TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (language, sign, date)
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (1, ?)")
            .bind(Utc::now().timestamp())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Number of records stored for `day`.
    pub async fn count_for_day(&self, day: NaiveDate) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM horoscopes WHERE date = ?")
            .bind(day.format("%Y-%m-%d").to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl HoroscopeStore for SqliteStore {
    #[instrument(level = "debug", skip_all, fields(language = %key.language, sign = %key.sign, date = %key.day))]
    async fn upsert(
        &self,
        key: &NaturalKey,
        status: Status,
        fields: &ExtractedFields,
    ) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO horoscopes (
                language, sign, date, status,
                horoscope, lucky_number, lucky_color, remedy, ratings,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(language, sign, date) DO UPDATE SET
                status = excluded.status,
                horoscope = excluded.horoscope,
                lucky_number = excluded.lucky_number,
                lucky_color = excluded.lucky_color,
                remedy = excluded.remedy,
                ratings = excluded.ratings,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&key.language)
        .bind(&key.sign)
        .bind(key.day_stamp())
        .bind(status.as_str())
        .bind(&fields.horoscope)
        .bind(&fields.lucky_number)
        .bind(&fields.lucky_color)
        .bind(&fields.remedy)
        .bind(serde_json::to_string(&fields.ratings)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_one(&self, key: &NaturalKey) -> Result<Option<StoredHoroscope>> {
        let row: Option<HoroscopeRow> = sqlx::query_as(
            r#"
            SELECT language, sign, date, status,
                   horoscope, lucky_number, lucky_color, remedy, ratings,
                   created_at, updated_at
            FROM horoscopes
            WHERE language = ? AND sign = ? AND date = ?
            "#,
        )
        .bind(&key.language)
        .bind(&key.sign)
        .bind(key.day_stamp())
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredHoroscope::try_from).transpose()
    }
}

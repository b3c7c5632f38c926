//! Metadata record storage.
//!
//! One row per URL. Reads treat rows at or past `expires_at` as absent;
//! physical removal happens only in [`CacheDb::sweep_expired`].

use super::connection::CacheDb;
use super::migrations::SCHEMA_VERSION;
use crate::Error;
use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Preview metadata extracted from a single page.
///
/// Empty strings mean "not found"; there is no other absent marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub image: String,
    pub site_name: String,
}

impl PageMetadata {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.description.is_empty() && self.image.is_empty() && self.site_name.is_empty()
    }
}

/// A cached metadata entry keyed by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub site_name: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl MetadataRecord {
    /// Build a record for `url` fetched at `now`, valid for `ttl`.
    ///
    /// Fails with `INVALID_RECORD` when the expiry overflows or lands past
    /// year 9999, where the stored text form would stop sorting correctly.
    pub fn stamp(
        url: impl Into<String>, page: PageMetadata, now: DateTime<Utc>, ttl: chrono::Duration,
    ) -> Result<Self, Error> {
        let expires_at = now
            .checked_add_signed(ttl)
            .filter(is_storable)
            .ok_or_else(|| Error::InvalidRecord(format!("ttl {ttl} from {now} is out of range")))?;

        Ok(Self {
            url: url.into(),
            title: page.title,
            description: page.description,
            image: page.image,
            site_name: page.site_name,
            fetched_at: now,
            expires_at,
        })
    }

    /// True once `now` has reached the expiry timestamp.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// The page fields without key or timestamps.
    pub fn page(&self) -> PageMetadata {
        PageMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            site_name: self.site_name.clone(),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.url.is_empty() {
            return Err(Error::InvalidRecord("url must not be empty".into()));
        }
        if !is_storable(&self.fetched_at) || !is_storable(&self.expires_at) {
            return Err(Error::InvalidRecord(format!(
                "timestamps {} / {} are outside years 0..=9999",
                self.fetched_at, self.expires_at
            )));
        }
        if self.expires_at <= self.fetched_at {
            return Err(Error::InvalidRecord(format!(
                "expires_at {} is not after fetched_at {}",
                self.expires_at, self.fetched_at
            )));
        }
        Ok(())
    }
}

/// Timestamps are stored with a fixed nine-digit fraction so that string
/// order in SQLite matches chronological order.
pub(crate) fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp.
///
/// Besides RFC 3339 this accepts the `DATETIME` text written by earlier
/// releases: `2006-01-02 15:04:05.999999999-07:00`, or the same without an
/// offset, read as UTC.
pub(crate) fn from_db_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Fixed-width text form only holds four-digit, non-negative years.
fn is_storable(ts: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&ts.year())
}

/// Row as read from SQLite. Older stores may hold NULLs.
struct StoredRow {
    url: String,
    title: Option<String>,
    description: Option<String>,
    image: Option<String>,
    site_name: Option<String>,
    fetched_at: Option<String>,
    expires_at: Option<String>,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            image: row.get(3)?,
            site_name: row.get(4)?,
            fetched_at: row.get(5)?,
            expires_at: row.get(6)?,
        })
    }

    fn into_record(self) -> Option<MetadataRecord> {
        let fetched_at = from_db_timestamp(self.fetched_at.as_deref()?)?;
        let expires_at = from_db_timestamp(self.expires_at.as_deref()?)?;
        Some(MetadataRecord {
            url: self.url,
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            image: self.image.unwrap_or_default(),
            site_name: self.site_name.unwrap_or_default(),
            fetched_at,
            expires_at,
        })
    }
}

impl CacheDb {
    /// Get the live record for `url`.
    ///
    /// Returns None if no row exists or the row has expired. Rows whose
    /// timestamps cannot be parsed are treated as absent.
    pub async fn get(&self, url: &str) -> Result<Option<MetadataRecord>, Error> {
        let key = url.to_string();
        let now = Utc::now();
        let now_str = to_db_timestamp(&now);

        let row = self
            .reader()
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, title, description, image, site_name, fetched_at, expires_at
                     FROM opengraph_cache WHERE url = ?1 AND expires_at > ?2",
                )?;

                match stmt.query_row(params![key, now_str], StoredRow::from_row) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        match row.into_record() {
            Some(record) if !record.is_expired_at(now) => Ok(Some(record)),
            Some(_) => Ok(None),
            None => {
                tracing::warn!(url, "cached row has unreadable timestamps, ignoring");
                Ok(None)
            }
        }
    }

    /// Insert or replace the record for its URL.
    ///
    /// Every column is overwritten; the last write wins.
    pub async fn put(&self, record: &MetadataRecord) -> Result<(), Error> {
        record.validate()?;

        let record = record.clone();
        let fetched_at = to_db_timestamp(&record.fetched_at);
        let expires_at = to_db_timestamp(&record.expires_at);

        self.writer
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO opengraph_cache (
                        url, title, description, image, site_name, fetched_at, expires_at, schema_version
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(url) DO UPDATE SET
                        title = excluded.title,
                        description = excluded.description,
                        image = excluded.image,
                        site_name = excluded.site_name,
                        fetched_at = excluded.fetched_at,
                        expires_at = excluded.expires_at,
                        schema_version = excluded.schema_version",
                    params![
                        &record.url,
                        &record.title,
                        &record.description,
                        &record.image,
                        &record.site_name,
                        fetched_at,
                        expires_at,
                        SCHEMA_VERSION,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every row whose expiry has passed.
    ///
    /// Returns the number of deleted entries. Running it again immediately
    /// deletes nothing.
    pub async fn sweep_expired(&self) -> Result<u64, Error> {
        let now = to_db_timestamp(&Utc::now());
        let count = self
            .writer
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM opengraph_cache WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)?;

        if count > 0 {
            tracing::info!(count, "swept expired metadata entries");
        }
        Ok(count)
    }
}

//! Cache statistics and storage maintenance.

use super::connection::CacheDb;
use super::records::{from_db_timestamp, to_db_timestamp};
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: u64,
    pub valid_entries: u64,
    pub expired_entries: u64,
    pub oldest_fetched_at: Option<DateTime<Utc>>,
    pub newest_fetched_at: Option<DateTime<Utc>>,
}

impl CacheDb {
    /// Count live and expired entries and report the fetch time range.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        let now = to_db_timestamp(&Utc::now());
        let (total, expired, oldest, newest) = self
            .reader()
            .call(move |conn| -> Result<(i64, i64, Option<String>, Option<String>), Error> {
                let row = conn.query_row(
                    "SELECT
                        COUNT(*),
                        COALESCE(SUM(CASE WHEN expires_at <= ?1 THEN 1 ELSE 0 END), 0),
                        MIN(NULLIF(fetched_at, '')),
                        MAX(NULLIF(fetched_at, ''))
                     FROM opengraph_cache",
                    params![now],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheStats {
            total_entries: total as u64,
            valid_entries: (total - expired) as u64,
            expired_entries: expired as u64,
            oldest_fetched_at: oldest.as_deref().and_then(from_db_timestamp),
            newest_fetched_at: newest.as_deref().and_then(from_db_timestamp),
        })
    }

    /// Rebuild the database file to reclaim space freed by sweeps.
    pub async fn vacuum(&self) -> Result<(), Error> {
        tracing::info!("vacuuming metadata cache");
        self.writer
            .call(|conn| -> Result<(), Error> {
                conn.execute_batch("VACUUM")?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Current size of the main database file in bytes.
    pub async fn size_bytes(&self) -> Result<u64, Error> {
        let size = self
            .reader()
            .call(|conn| -> Result<i64, Error> {
                let size = conn.query_row(
                    "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                    [],
                    |row| row.get(0),
                )?;
                Ok(size)
            })
            .await
            .map_err(Error::from)?;
        Ok(size as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MetadataRecord, PageMetadata};
    use chrono::Duration;

    #[tokio::test]
    async fn test_stats_empty() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stats = db.stats().await.unwrap();
        assert_eq!(stats, CacheStats::default());
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        let old = now - Duration::hours(30);

        let ttl = Duration::hours(24);
        let fresh = MetadataRecord::stamp("https://example.com/fresh", PageMetadata::default(), now, ttl).unwrap();
        let stale = MetadataRecord::stamp("https://example.com/stale", PageMetadata::default(), old, ttl).unwrap();
        db.put(&fresh).await.unwrap();
        db.put(&stale).await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.oldest_fetched_at, Some(old));
        assert_eq!(stats.newest_fetched_at, Some(now));
    }

    #[tokio::test]
    async fn test_vacuum_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let db = CacheDb::open(dir.path().join("cache.db"), 1).await.unwrap();
        db.vacuum().await.unwrap();
        assert!(db.size_bytes().await.unwrap() > 0);
    }
}

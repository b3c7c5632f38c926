//! Database schema migrations.
//!
//! Two passes run on every open, before any request is served:
//!
//! 1. Versioned SQL batches tracked in `_migrations`. These only ever create
//!    objects (`CREATE ... IF NOT EXISTS`).
//! 2. Column reconciliation. A store written by an earlier release may lack
//!    columns introduced later; each missing column is added with a default
//!    so existing rows stay readable. Columns are never dropped or retyped.
//! 3. Timestamp normalization. Earlier releases stored `DATETIME` text
//!    (`2006-01-02 15:04:05-07:00`), which does not compare correctly
//!    against RFC 3339 strings. Such values are rewritten in place; values
//!    that cannot be parsed become empty and read as expired.

use std::collections::HashSet;
use std::num::ParseIntError;

use super::Error;
use super::records::{from_db_timestamp, to_db_timestamp};
use tokio_rusqlite::{Connection, params, rusqlite};

/// Migration list: (version, SQL).
///
/// Migrations must be applied in order. The version number is an
/// incrementing integer used to track which migrations have been applied.
const MIGRATIONS: &[(&str, &str)] = &[("1", include_str!("../../migrations/001_opengraph_cache.sql"))];

/// Indexes are created after reconciliation since they may reference columns
/// an older store is missing.
const INDEXES: &str = include_str!("../../migrations/indexes.sql");

/// Every non-key column of `opengraph_cache` with the declaration used to add
/// it to an older store.
pub(crate) const EXPECTED_COLUMNS: &[(&str, &str)] = &[
    ("title", "TEXT NOT NULL DEFAULT ''"),
    ("description", "TEXT NOT NULL DEFAULT ''"),
    ("image", "TEXT NOT NULL DEFAULT ''"),
    ("site_name", "TEXT NOT NULL DEFAULT ''"),
    ("fetched_at", "TEXT NOT NULL DEFAULT ''"),
    ("expires_at", "TEXT NOT NULL DEFAULT ''"),
    ("schema_version", "INTEGER NOT NULL DEFAULT 1"),
];

/// Matches the fixed-width form written by `to_db_timestamp`.
const CANONICAL_TIMESTAMP_GLOB: &str =
    "[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]T[0-9][0-9]:[0-9][0-9]:[0-9][0-9].[0-9][0-9][0-9][0-9][0-9][0-9][0-9][0-9][0-9]Z";

/// Value written to `schema_version` by this release. Rows that predate the
/// marker column read back as 1.
pub const SCHEMA_VERSION: i64 = 2;

/// Run any pending migrations and reconcile columns.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(Error::from)?;

        let current: i64 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
                row.get(0)
            })
            .map_err(Error::from)?;

        for (version, sql) in MIGRATIONS {
            let version_num: i64 = version
                .parse()
                .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
            if version_num > current {
                conn.execute_batch(sql)
                    .map_err(|e| Error::MigrationFailed(format!("version {version_num}: {e}")))?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version_num, chrono::Utc::now().to_rfc3339()],
                )
                .map_err(Error::from)?;
            }
        }

        reconcile_columns(conn)?;
        normalize_timestamps(conn)?;

        conn.execute_batch(INDEXES)
            .map_err(|e| Error::MigrationFailed(format!("indexes: {e}")))?;

        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Add every expected column missing from `opengraph_cache`.
///
/// Returns the names of the columns that were added.
fn reconcile_columns(conn: &rusqlite::Connection) -> Result<Vec<&'static str>, Error> {
    let existing = table_columns(conn)?;
    let mut added = Vec::new();

    for (name, decl) in EXPECTED_COLUMNS {
        if existing.contains(*name) {
            continue;
        }

        conn.execute_batch(&format!("ALTER TABLE opengraph_cache ADD COLUMN {name} {decl}"))
            .map_err(|e| Error::MigrationFailed(format!("add column {name}: {e}")))?;
        tracing::info!(column = name, "added missing column to opengraph_cache");
        added.push(*name);
    }

    Ok(added)
}

/// Rewrite non-canonical `fetched_at`/`expires_at` values.
///
/// Returns the number of rows rewritten.
fn normalize_timestamps(conn: &rusqlite::Connection) -> Result<usize, Error> {
    let rows: Vec<(String, Option<String>, Option<String>)> = {
        let mut stmt = conn.prepare(
            "SELECT url, fetched_at, expires_at FROM opengraph_cache
             WHERE fetched_at IS NULL OR expires_at IS NULL
                OR (fetched_at <> '' AND fetched_at NOT GLOB ?1)
                OR (expires_at <> '' AND expires_at NOT GLOB ?1)",
        )?;
        stmt.query_map(params![CANONICAL_TIMESTAMP_GLOB], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<_, _>>()?
    };

    if rows.is_empty() {
        return Ok(0);
    }

    let canonical = |raw: Option<&str>| raw.and_then(from_db_timestamp).map(|ts| to_db_timestamp(&ts)).unwrap_or_default();

    let tx = conn.unchecked_transaction()?;
    {
        let mut update = tx.prepare("UPDATE opengraph_cache SET fetched_at = ?2, expires_at = ?3 WHERE url = ?1")?;
        for (url, fetched_at, expires_at) in &rows {
            update.execute(params![url, canonical(fetched_at.as_deref()), canonical(expires_at.as_deref())])?;
        }
    }
    tx.commit()?;

    tracing::info!(rows = rows.len(), "normalized legacy timestamps in opengraph_cache");
    Ok(rows.len())
}

fn table_columns(conn: &rusqlite::Connection) -> Result<HashSet<String>, Error> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('opengraph_cache')")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(names)
}

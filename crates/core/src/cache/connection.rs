//! Database connection management with pragma configuration.
//!
//! A file-backed cache keeps one writer connection and a small set of
//! read-only connections. SQLite in WAL mode lets readers proceed while the
//! writer commits, and every write is serialized through the single writer.

use super::migrations;
use crate::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_rusqlite::{Connection, rusqlite};

const WRITER_PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA busy_timeout=5000;";

const READER_PRAGMAS: &str = "PRAGMA query_only=ON;
     PRAGMA temp_store=MEMORY;
     PRAGMA busy_timeout=5000;";

/// Cache database handle.
///
/// Cloning is cheap; clones share the same connections. Each tokio-rusqlite
/// Connection runs its statements on a dedicated background thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) writer: Connection,
    readers: Arc<[Connection]>,
    next_reader: Arc<AtomicUsize>,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies pragmas, runs pending
    /// migrations on the writer, then opens `reader_connections` read-only
    /// connections. With zero readers every query goes through the writer.
    pub async fn open(path: impl AsRef<Path>, reader_connections: usize) -> Result<Self, Error> {
        let path = path.as_ref();
        let writer = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        apply_pragmas(&writer, WRITER_PRAGMAS).await?;

        migrations::run(&writer).await?;

        let mut readers = Vec::with_capacity(reader_connections);
        for _ in 0..reader_connections {
            let reader = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
            apply_pragmas(&reader, READER_PRAGMAS).await?;
            readers.push(reader);
        }

        tracing::debug!(path = %path.display(), readers = readers.len(), "opened metadata cache");

        Ok(Self { writer, readers: readers.into(), next_reader: Arc::new(AtomicUsize::new(0)) })
    }

    /// Open an in-memory database for testing.
    ///
    /// An in-memory database is private to its connection, so the writer
    /// also serves reads.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let writer = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        apply_pragmas(&writer, WRITER_PRAGMAS).await?;

        migrations::run(&writer).await?;

        Ok(Self { writer, readers: Vec::new().into(), next_reader: Arc::new(AtomicUsize::new(0)) })
    }

    /// Connection for a read-only query, round-robin over the readers.
    pub(crate) fn reader(&self) -> &Connection {
        if self.readers.is_empty() {
            return &self.writer;
        }
        let idx = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        &self.readers[idx]
    }

    /// Number of dedicated read connections.
    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }
}

async fn apply_pragmas(conn: &Connection, pragmas: &'static str) -> Result<(), Error> {
    conn.call(move |conn| -> Result<(), rusqlite::Error> {
        conn.execute_batch(pragmas)?;
        Ok(())
    })
    .await
    .map_err(Error::Database)
}

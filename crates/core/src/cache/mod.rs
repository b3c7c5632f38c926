//! SQLite-backed cache for page metadata.
//!
//! This module provides a persistent URL-keyed cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Logical expiry on read, physical removal by sweep
//! - Additive schema migrations that accept stores from older releases
//! - WAL mode with one writer and several read-only connections
//! - Occupancy statistics and vacuuming

pub mod connection;
pub mod migrations;
pub mod records;
pub mod stats;

pub use crate::Error;

pub use connection::CacheDb;
pub use records::{MetadataRecord, PageMetadata};
pub use stats::CacheStats;

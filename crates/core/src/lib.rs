//! Core types and shared functionality for ogmeta.
//!
//! This crate provides:
//! - Metadata cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStats, MetadataRecord, PageMetadata};
pub use config::{AppConfig, ConfigError};
pub use error::Error;

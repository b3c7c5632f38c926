//! Client code for ogmeta.
//!
//! This crate provides the metadata acquisition pipeline: URL
//! classification, the HTTP fetcher, OpenGraph extraction and the
//! coordinator that ties them to the cache.

pub mod classify;
pub mod coordinator;
pub mod extract;
pub mod fetch;

pub use classify::{Classification, Classifier, SkipReason};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use extract::{Extractor, OpenGraphExtractor, cleanup_metadata, extract_metadata};
pub use fetch::{FetchClient, FetchConfig, FetchedPage, PageSource};

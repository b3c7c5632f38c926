//! Acquisition coordinator: classify, consult the cache, fetch on miss.
//!
//! Per-URL failures never escape: the caller gets a map with the URLs that
//! produced metadata and nothing for the rest. Failures are not cached, so
//! the next call retries them.

use chrono::Utc;
use ogmeta_core::{AppConfig, CacheDb, Error, MetadataRecord, PageMetadata};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::classify::{Classification, Classifier};
use crate::extract::{Extractor, OpenGraphExtractor};
use crate::fetch::{FetchClient, FetchConfig, PageSource};

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum fetches in flight for one `resolve_many` call (default: 5)
    pub max_concurrency: usize,

    /// How long a fetched record stays fresh (default: 24h)
    pub ttl: chrono::Duration,

    /// URL eligibility rules
    pub classifier: Classifier,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CoordinatorConfig {
    fn from(config: &AppConfig) -> Self {
        Self { max_concurrency: config.max_concurrency, ttl: config.ttl(), classifier: Classifier::from_config(config) }
    }
}

/// Ties the classifier, cache store, fetcher and extractor together.
///
/// Cloning is cheap; clones share the cache connections and HTTP client.
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<CoordinatorConfig>,
    cache: CacheDb,
    source: Arc<dyn PageSource>,
    extractor: Arc<dyn Extractor>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig, cache: CacheDb, source: Arc<dyn PageSource>, extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self { config: Arc::new(config), cache, source, extractor }
    }

    /// Wire the default HTTP fetcher and OpenGraph extractor.
    pub fn from_config(config: &AppConfig, cache: CacheDb) -> Result<Self, Error> {
        let fetcher = FetchClient::new(FetchConfig::from(config))?;
        Ok(Self::new(CoordinatorConfig::from(config), cache, Arc::new(fetcher), Arc::new(OpenGraphExtractor::new())))
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }

    /// Resolve metadata for one URL.
    ///
    /// Returns `None` for ineligible URLs and for any fetch or extract
    /// failure. Cache errors degrade to a miss on read and are only logged
    /// on write.
    pub async fn resolve(&self, url: &str) -> Option<MetadataRecord> {
        if let Classification::Skip(reason) = self.config.classifier.classify(url) {
            tracing::debug!(url, ?reason, "skipping ineligible URL");
            return None;
        }

        match self.cache.get(url).await {
            Ok(Some(record)) => {
                tracing::debug!(url, "cache hit");
                return Some(record);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(url, error = %e, "cache read failed, treating as miss"),
        }

        tracing::info!(url, "fetching metadata");
        let page = match self.fetch_and_extract(url).await {
            Ok(page) => page,
            Err(Error::UnsupportedContentType(content_type)) => {
                tracing::debug!(url, content_type = %content_type, "skipping non-HTML content");
                return None;
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to resolve metadata");
                return None;
            }
        };

        let record = match MetadataRecord::stamp(url, page, Utc::now(), self.config.ttl) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to stamp metadata");
                return None;
            }
        };
        if let Err(e) = self.cache.put(&record).await {
            tracing::warn!(url, error = %e, "failed to cache metadata");
        }

        Some(record)
    }

    async fn fetch_and_extract(&self, url: &str) -> Result<PageMetadata, Error> {
        let fetched = self.source.fetch_page(url).await?;
        self.extractor.extract(&fetched.html, &fetched.final_url)
    }

    /// Resolve a batch of URLs with at most `max_concurrency` in flight.
    ///
    /// Empty strings are dropped and duplicates collapsed. The result holds
    /// an entry only for URLs that produced a record.
    pub async fn resolve_many<I, S>(&self, urls: I) -> HashMap<String, MetadataRecord>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<String> = urls
            .into_iter()
            .map(Into::into)
            .filter(|url| !url.is_empty() && seen.insert(url.clone()))
            .collect();

        let requested = unique.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for url in unique {
            let semaphore = semaphore.clone();
            let this = self.clone();

            join_set.spawn(async move {
                // Held for the whole resolve so the ceiling covers fetch and cache I/O.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (url, None);
                };
                let record = this.resolve(&url).await;
                (url, record)
            });
        }

        let mut results = HashMap::with_capacity(requested);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((url, Some(record))) => {
                    results.insert(url, record);
                }
                Ok((_, None)) => {}
                Err(e) => tracing::error!(error = %e, "metadata task failed"),
            }
        }

        tracing::info!(requested, resolved = results.len(), "resolved metadata batch");
        results
    }

    /// Delete expired cache rows.
    pub async fn sweep_expired(&self) -> Result<u64, Error> {
        self.cache.sweep_expired().await
    }
}

//! URL eligibility for metadata fetching.
//!
//! Matching is plain substring containment on the URL as given, case
//! sensitive, with no parsing or DNS. `https://example.com/?ref=facebook.com`
//! is therefore skipped as well; see DESIGN.md for why this is kept.

use ogmeta_core::AppConfig;
use ogmeta_core::config::{DEFAULT_BLOCKED_DOMAINS, DEFAULT_PLATFORM_DOMAINS};

/// Why a URL was excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Points at the link source itself.
    SourcePlatform(String),
    /// Matches a domain known to block scrapers.
    Blocklisted(String),
}

/// Result of classifying one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Eligible,
    Skip(SkipReason),
}

impl Classification {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Classification::Eligible)
    }
}

/// Stateless URL classifier built from domain lists.
#[derive(Debug, Clone)]
pub struct Classifier {
    platform_domains: Vec<String>,
    blocked_domains: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_PLATFORM_DOMAINS.iter().map(|d| d.to_string()),
            DEFAULT_BLOCKED_DOMAINS.iter().map(|d| d.to_string()),
        )
    }
}

impl Classifier {
    /// Build a classifier. Empty entries are dropped since they would match
    /// every URL.
    pub fn new(
        platform_domains: impl IntoIterator<Item = String>, blocked_domains: impl IntoIterator<Item = String>,
    ) -> Self {
        Self { platform_domains: clean_domains(platform_domains), blocked_domains: clean_domains(blocked_domains) }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.platform_domains.clone(), config.blocked_domains.clone())
    }

    /// Classify a URL. Total: any string, including garbage, gets an answer.
    pub fn classify(&self, url: &str) -> Classification {
        if let Some(domain) = self.platform_domains.iter().find(|d| url.contains(d.as_str())) {
            return Classification::Skip(SkipReason::SourcePlatform(domain.clone()));
        }
        if let Some(domain) = self.blocked_domains.iter().find(|d| url.contains(d.as_str())) {
            return Classification::Skip(SkipReason::Blocklisted(domain.clone()));
        }
        Classification::Eligible
    }

    pub fn is_eligible(&self, url: &str) -> bool {
        self.classify(url).is_eligible()
    }
}

fn clean_domains(list: impl IntoIterator<Item = String>) -> Vec<String> {
    list.into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}

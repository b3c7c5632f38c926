//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OGMETA_*)
//! 2. TOML config file (if OGMETA_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Domains belonging to the link source itself (main site and short links).
pub const DEFAULT_PLATFORM_DOMAINS: &[&str] = &["reddit.com", "redd.it"];

/// Domains that answer unauthenticated scrapers with login walls or media
/// blobs instead of pages worth previewing.
pub const DEFAULT_BLOCKED_DOMAINS: &[&str] = &[
    "x.com",
    "twitter.com",
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "i.redd.it",
    "v.redd.it",
    "reddit.com/gallery",
];

/// Longest accepted cache TTL (ten years).
pub const MAX_TTL_HOURS: u64 = 87_600;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OGMETA_*)
/// 2. TOML config file (if OGMETA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite metadata cache.
    ///
    /// Set via OGMETA_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string sent with every page request.
    ///
    /// Set via OGMETA_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum body bytes read per page; the rest is dropped.
    ///
    /// Set via OGMETA_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// End-to-end request timeout in milliseconds.
    ///
    /// Set via OGMETA_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Ceiling on simultaneous in-flight acquisitions.
    ///
    /// Set via OGMETA_MAX_CONCURRENCY environment variable.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Cache time-to-live in hours.
    ///
    /// Set via OGMETA_TTL_HOURS environment variable.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Number of read-only connections opened next to the writer.
    #[serde(default = "default_reader_connections")]
    pub reader_connections: usize,

    /// Source platform domains never fetched.
    ///
    /// Set via OGMETA_PLATFORM_DOMAINS environment variable.
    #[serde(default = "default_platform_domains")]
    pub platform_domains: Vec<String>,

    /// Domains known to block scraping.
    ///
    /// Set via OGMETA_BLOCKED_DOMAINS environment variable.
    #[serde(default = "default_blocked_domains")]
    pub blocked_domains: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./opengraph_cache.db")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
        .into()
}

fn default_max_bytes() -> usize {
    1_048_576 // 1MB
}

fn default_timeout_ms() -> u64 {
    8_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_concurrency() -> usize {
    5
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_reader_connections() -> usize {
    4
}

fn default_platform_domains() -> Vec<String> {
    DEFAULT_PLATFORM_DOMAINS.iter().map(|d| d.to_string()).collect()
}

fn default_blocked_domains() -> Vec<String> {
    DEFAULT_BLOCKED_DOMAINS.iter().map(|d| d.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            max_concurrency: default_max_concurrency(),
            ttl_hours: default_ttl_hours(),
            reader_connections: default_reader_connections(),
            platform_domains: default_platform_domains(),
            blocked_domains: default_blocked_domains(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache TTL as a chrono Duration for timestamp arithmetic.
    ///
    /// Clamped to `MAX_TTL_HOURS` so an unvalidated config cannot overflow.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours.min(MAX_TTL_HOURS) as i64)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OGMETA_`
    /// 2. TOML file from `OGMETA_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// List values are comma-separated in the environment
    /// (`OGMETA_BLOCKED_DOMAINS=x.com,facebook.com`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OGMETA_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OGMETA_")
                .ignore(&["CONFIG_FILE", "PLATFORM_DOMAINS", "BLOCKED_DOMAINS"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let mut config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        if let Ok(list) = std::env::var("OGMETA_PLATFORM_DOMAINS") {
            config.platform_domains = split_list(&list);
        }
        if let Ok(list) = std::env::var("OGMETA_BLOCKED_DOMAINS") {
            config.blocked_domains = split_list(&list);
        }

        config.validate()?;

        Ok(config)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./opengraph_cache.db"));
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.max_bytes, 1024 * 1024);
        assert_eq!(config.timeout_ms, 8_000);
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.ttl_hours, 24);
        assert_eq!(config.platform_domains, vec!["reddit.com", "redd.it"]);
        assert!(config.blocked_domains.iter().any(|d| d == "twitter.com"));
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(8_000));
    }

    #[test]
    fn test_ttl_duration() {
        let config = AppConfig { ttl_hours: 2, ..Default::default() };
        assert_eq!(config.ttl(), chrono::Duration::hours(2));
    }

    #[test]
    fn test_ttl_duration_clamped() {
        let config = AppConfig { ttl_hours: 2_500_000_000, ..Default::default() };
        assert_eq!(config.ttl(), chrono::Duration::hours(MAX_TTL_HOURS as i64));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("x.com, facebook.com,,"), vec!["x.com", "facebook.com"]);
        assert!(split_list("").is_empty());
    }
}

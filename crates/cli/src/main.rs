//! ogmeta command-line entry point.
//!
//! Results go to stdout as JSON; logs go to stderr so output stays pipeable.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ogmeta_client::Coordinator;
use ogmeta_core::{AppConfig, CacheDb};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ogmeta", version, about = "Fetch and cache OpenGraph metadata for links", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Cache database path (overrides OGMETA_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve metadata for URLs given as arguments, or one per line on stdin
    Resolve {
        urls: Vec<String>,
    },

    /// Delete expired cache entries
    Sweep,

    /// Print cache statistics
    Stats,

    /// Compact the cache database
    Vacuum,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let cache = CacheDb::open(&config.db_path, config.reader_connections)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;

    match cli.command {
        Commands::Resolve { urls } => {
            let urls = if urls.is_empty() { read_stdin_urls()? } else { urls };
            let coordinator = Coordinator::from_config(&config, cache)?;
            let results: BTreeMap<_, _> = coordinator.resolve_many(urls).await.into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Sweep => {
            let removed = cache.sweep_expired().await?;
            println!("{}", serde_json::json!({ "removed": removed }));
        }
        Commands::Stats => {
            let stats = cache.stats().await?;
            let size_bytes = cache.size_bytes().await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "stats": stats, "size_bytes": size_bytes }))?);
        }
        Commands::Vacuum => {
            cache.vacuum().await?;
            tracing::info!("cache vacuumed");
        }
    }

    Ok(())
}

fn read_stdin_urls() -> Result<Vec<String>> {
    let mut urls = Vec::new();
    for line in std::io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        let url = line.trim();
        if !url.is_empty() {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}

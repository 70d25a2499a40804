//! File Cache Demo Application
//!
//! Caches a pretend schema reflection in a JSON file, reopens it and shows
//! that an unchanged save does not touch the disk.
//!
//! Usage:
//!   cargo run --example file_cache_demo
//!
//! Environment variables:
//!   NOTORM_CACHE_PATH - cache file (default: notorm-cache.json in the temp dir)
//!   RUST_LOG          - log filter (default: info)

use notorm_cache::{Cache, CacheExt, FileCache};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TableSchema {
    primary: String,
    columns: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::var("NOTORM_CACHE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("notorm-cache.json"));

    info!("=== File Cache Demo ({}) ===", path.display());

    let cache = FileCache::open(&path).await;
    let users = TableSchema {
        primary: "id".to_string(),
        columns: vec!["id".to_string(), "name".to_string(), "email".to_string()],
    };

    match cache.load_as::<TableSchema>("schema.users").await {
        Some(schema) => info!("Warm cache, users table: {:?}", schema),
        None => {
            info!("Cold cache, reflecting users table");
            cache.save_as("schema.users", &users).await?;
        }
    }

    info!("\n--- Repeated save ---");
    cache.save_as("schema.users", &users).await?;
    info!("{}", cache.stats().await);

    info!("\n--- Reopen ---");
    let reopened = FileCache::open(&path).await;
    info!("schema.users: {:?}", reopened.load("schema.users").await);
    info!("schema.orders: {:?}", reopened.load("schema.orders").await);

    Ok(())
}

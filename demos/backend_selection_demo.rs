//! Backend Selection Demo Application
//!
//! Opens whichever backend the environment (or a `.env` file) selects and
//! runs the same load/save sequence against it.
//!
//! Usage:
//!   NOTORM_CACHE_BACKEND=database NOTORM_CACHE_PATH=cache.db \
//!     cargo run --example backend_selection_demo
//!
//! Environment variables:
//!   NOTORM_CACHE_BACKEND   - session | file | include | database | shared_memory
//!   NOTORM_CACHE_PATH      - file or database path
//!   NOTORM_CACHE_TABLE     - database table (default: notorm)
//!   NOTORM_CACHE_POOL_SIZE - pooled database connections (default: 10)
//!   NOTORM_CACHE_CAPACITY  - shared memory entries (default: 10000)

use notorm_cache::{CacheConfig, Session};
use serde_json::json;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let config = CacheConfig::from_env()?;
    info!("Configuration: {:?}", config);

    let session = Session::new();
    let cache = config.open_with_session(session).await?;

    info!("=== {} backend ===", cache.backend_name());

    let keys = [
        ("schema.users", json!({"columns": ["id", "name"]})),
        ("schema.users.auto_increment", json!(true)),
        ("schema.orders.indexes", json!([])),
    ];

    for (key, value) in &keys {
        if let Some(cached) = cache.load(key).await {
            info!("hit  {} = {}", key, cached);
            continue;
        }
        info!("miss {}", key);
        cache.save(key, value.clone()).await?;
    }

    for (key, _) in &keys {
        info!("{} -> {:?}", key, cache.load(key).await);
    }

    Ok(())
}

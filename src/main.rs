//! Catalog Service - HTTP catalog backed by SQLite
//!
//! Serves the JSON API and HTML pages until interrupted with Ctrl-C.

use catalog_service::web::rate_limit::RateLimiter;
use catalog_service::{AppState, ProductCache, Store};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Product catalog server - products, variants and reviews over HTTP
#[derive(Parser, Debug)]
#[command(name = "catalog_service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Path to the SQLite database file
    #[arg(short, long, env = "DB_PATH", default_value = "catalog.db")]
    database: PathBuf,

    /// Insert the sample catalog when the database is empty
    #[arg(long, env = "CATALOG_SEED", default_value_t = false)]
    seed: bool,

    /// Lifetime of cached product lookups, in seconds
    #[arg(long, default_value_t = 3)]
    cache_ttl_secs: u64,

    /// Requests allowed per client in each rate-limit window
    #[arg(long, default_value_t = 100)]
    rate_limit: u32,

    /// Length of the rate-limit window, in seconds
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    rate_window_secs: u64,

    /// Directory served under /static
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    log::info!("Starting catalog_service...");
    log::info!("Database path: {}", args.database.display());

    // Ensure parent directory exists
    if let Some(parent) = args.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create database directory: {}", e);
                std::process::exit(1);
            }
            log::info!("Created directory: {}", parent.display());
        }
    }

    let cache = ProductCache::new(Duration::from_secs(args.cache_ttl_secs));
    let store = match Store::open(&args.database, cache) {
        Ok(store) => {
            log::info!("Opened database: {}", args.database.display());
            store
        }
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if args.seed {
        match store.seed_sample_data() {
            Ok(0) => log::info!("Database already has products, skipping seed"),
            Ok(_) => {}
            Err(e) => {
                log::error!("Failed to seed database: {}", e);
                std::process::exit(1);
            }
        }
    }

    let rate_limiter = RateLimiter::new(
        args.rate_limit,
        Duration::from_secs(args.rate_window_secs),
    );
    let state = Arc::new(AppState::new(store, rate_limiter));

    if let Err(e) = catalog_service::serve(state, &args.static_dir, args.port).await {
        log::error!("Web server error: {}", e);
        std::process::exit(1);
    }
}

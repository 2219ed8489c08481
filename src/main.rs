mod api;
mod config;
mod db;
mod error;
mod state;
mod summary;
mod types;
mod validation;
mod variation;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::store::PriceStore;
use crate::error::Result;
use crate::state::ItemCatalog;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let options = SqliteConnectOptions::new()
        .filename(&cfg.db_path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Item catalog (shared lookup for labels and handlers) ---
    let store = PriceStore::new(pool.clone());
    let catalog = ItemCatalog::new();
    let items = store.items().await?;
    catalog.replace_all(&items);
    info!("Item catalog loaded: {} items", items.len());
    if catalog.is_empty() {
        warn!("Item catalog is empty — POST /items to register items before logging prices.");
    }

    if cfg.admin_users.is_empty() {
        warn!("ADMIN_USERS not set — every price overwrite will queue a change request.");
    } else {
        info!("Admins configured: {}", cfg.admin_users.join(", "));
    }

    // --- HTTP API server ---
    let health = Arc::new(HealthState::new(now_ns()));
    let api_state = ApiState {
        store,
        catalog,
        config: Arc::new(cfg.clone()),
        health,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

pub(crate) fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

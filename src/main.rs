//! bonusd — loyalty-points accrual reconciliation service.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! connects the order store (fatal if unreachable), and runs the
//! reconciliation loop with graceful shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use bonusd::accrual::RandomOracle;
use bonusd::config::AppConfig;
use bonusd::reconcile::Reconciler;
use bonusd::store::{MemStore, OrderStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;

    init_logging();

    info!(
        service = %cfg.service.name,
        interval_secs = cfg.reconciler.poll_interval_secs,
        workers_per_stage = cfg.reconciler.workers_per_stage,
        "bonusd starting up"
    );

    match cfg.database.resolve_url() {
        Some(url) => {
            let store = PgStore::connect(&url)
                .await
                .context("Failed to connect to the order store")?;
            store
                .ensure_schema()
                .await
                .context("Failed to prepare the orders table")?;
            run_service(store, &cfg).await
        }
        None => {
            warn!("No database configured — using in-memory store");
            run_service(MemStore::new(), &cfg).await
        }
    }
}

async fn run_service<S: OrderStore + 'static>(store: S, cfg: &AppConfig) -> Result<()> {
    let reconciler = Reconciler::new(
        Arc::new(store),
        Arc::new(RandomOracle::new()),
        cfg.reconciler.clone(),
    );

    reconciler
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    info!("bonusd shut down cleanly");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bonusd=info"));

    let json_logging = std::env::var("BONUSD_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}

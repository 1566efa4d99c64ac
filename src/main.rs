mod api;
mod config;
mod db;
mod decoders;
mod dispatch;
mod error;
mod helius;
mod ingest;
mod models;
mod provision;
mod registry;

use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Helius ingestor starting...");

    // Load configuration
    let cfg = config::load()?;

    // Run DB migrations once at startup
    {
        let conn = db::connect(&cfg.db_path)?;
        db::run_migrations(&conn)?;
    }

    // Shared DB connection, passed explicitly into each component
    let shared_conn = Arc::new(Mutex::new(db::connect(&cfg.db_path)?));

    // Spawn API task
    let api_handle = tokio::spawn({
        let cfg = cfg.clone();
        let conn = Arc::clone(&shared_conn);
        async move { api::serve(cfg, conn).await }
    });

    // Graceful shutdown
    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Helius ingestor stopped.");
    Ok(())
}

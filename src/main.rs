// src/main.rs
use ticker_watch::adapter::WatchlistCoordinator;
use ticker_watch::config::Config;
use ticker_watch::domain::errors::{AppError, AppResult};

use tokio::signal::ctrl_c;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting ticker_watch v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Polling {} every {}s, watchlist file {}",
        config.quote.endpoint,
        config.poller.interval_secs,
        config.storage.watchlist_path
    );

    let mut coordinator = WatchlistCoordinator::from_config(&config);
    coordinator.start().await?;

    // Wait for shutdown signal
    log::info!("Tracker is running. Press Ctrl+C to stop.");
    ctrl_c().await.map_err(AppError::Io)?;

    // Shutdown
    log::info!("Shutting down...");
    if let Err(e) = coordinator.stop().await {
        log::warn!("Shutdown finished with errors: {}", e);
    }

    log::info!("Shutdown complete. Goodbye!");
    Ok(())
}

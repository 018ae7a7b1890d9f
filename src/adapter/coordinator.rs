// src/adapter/coordinator.rs
// Watchlist system coordinator

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::application::service::WatchlistService;
use crate::application::store::WatchlistStore;
use crate::application::usecase::{Poller, PriceUpdater};
use crate::config::Config;
use crate::domain::errors::AppResult;
use crate::domain::repository::{QuoteSource, WatchlistRepository};
use crate::infrastructure::persistence::JsonWatchlistRepository;
use crate::infrastructure::quote::{
    FallbackQuoteSource, FetchStats, HttpQuoteSource, SyntheticPriceGenerator,
};

/// Owns the service, the poller and the alert consumer task
pub struct WatchlistCoordinator {
    service: Arc<WatchlistService>,
    poller: Poller,
    stats: Option<Arc<FetchStats>>,
    seed_symbols: Vec<String>,
    alert_task: Option<JoinHandle<()>>,
    running: bool,
}

impl WatchlistCoordinator {
    /// Wire the HTTP quote source, synthetic fallback and JSON storage
    pub fn from_config(config: &Config) -> Self {
        let primary = Arc::new(HttpQuoteSource::new(
            &config.quote.endpoint,
            &config.quote.api_key,
        ));
        let generator = match config.quote.synthetic_seed {
            Some(seed) => SyntheticPriceGenerator::seeded(seed),
            None => SyntheticPriceGenerator::new(),
        };
        let quotes = FallbackQuoteSource::new(primary, generator, config.quote.timeout());
        let stats = quotes.stats();

        let repository = Arc::new(JsonWatchlistRepository::new(&config.storage.watchlist_path));

        let mut coordinator = Self::new(
            Arc::new(quotes),
            repository,
            config.poller.history_capacity,
            config.poller.interval(),
        );
        coordinator.stats = Some(stats);
        coordinator.seed_symbols = config.seed_symbols.clone();
        coordinator
    }

    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        repository: Arc<dyn WatchlistRepository>,
        history_capacity: usize,
        interval: Duration,
    ) -> Self {
        let store = Arc::new(WatchlistStore::new(history_capacity));
        let updater = Arc::new(PriceUpdater::new(store, quotes));
        let service = Arc::new(WatchlistService::new(updater.clone(), repository));

        Self {
            service,
            poller: Poller::new(updater, interval),
            stats: None,
            seed_symbols: Vec::new(),
            alert_task: None,
            running: false,
        }
    }

    pub fn with_seed_symbols(mut self, symbols: Vec<String>) -> Self {
        self.seed_symbols = symbols;
        self
    }

    pub fn service(&self) -> Arc<WatchlistService> {
        self.service.clone()
    }

    pub fn stats(&self) -> Option<Arc<FetchStats>> {
        self.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Load the stored watchlist, seed it if empty and start polling
    pub async fn start(&mut self) -> AppResult<()> {
        if self.running {
            return Ok(());
        }

        if let Err(e) = self.service.load() {
            log::warn!("Could not load watchlist, starting empty: {}", e);
        }

        if self.service.store().is_empty() {
            for raw in &self.seed_symbols {
                match self.service.add_symbol(raw).await {
                    Ok(report) if report.changed => log::info!("Seeded {}", report.symbol),
                    Ok(_) => {}
                    Err(e) => log::warn!("Skipping seed symbol {:?}: {}", raw, e),
                }
            }
        }

        self.spawn_alert_logger();
        self.poller.start()?;

        self.running = true;
        log::info!(
            "Watchlist coordinator started with {} symbols",
            self.service.store().len()
        );

        Ok(())
    }

    /// Stop polling after the in-flight tick and write the watchlist once more
    pub async fn stop(&mut self) -> AppResult<()> {
        if !self.running {
            return Ok(());
        }

        self.poller.stop().await;

        if let Some(task) = self.alert_task.take() {
            task.abort();
        }

        if let Some(stats) = &self.stats {
            let counts = stats.counts();
            log::info!(
                "Quotes served: {} live, {} synthetic",
                counts.live,
                counts.synthetic
            );
        }

        self.running = false;
        self.service.save()?;
        log::info!("Watchlist coordinator stopped");

        Ok(())
    }

    fn spawn_alert_logger(&mut self) {
        let mut alert_rx = self.service.subscribe_alerts();

        self.alert_task = Some(tokio::spawn(async move {
            loop {
                match alert_rx.recv().await {
                    Ok(alert) => {
                        log::warn!("{} [{}] at {}", alert.message, alert.kind, alert.timestamp);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Alert logger lagged, {} alerts not shown", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::QuoteResult;
    use crate::domain::model::{Quote, QuoteOrigin, Symbol, ThresholdKind};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StepQuotes {
        calls: AtomicU32,
    }

    #[async_trait]
    impl QuoteSource for StepQuotes {
        async fn fetch(&self, symbol: &Symbol) -> QuoteResult<Quote> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Quote {
                symbol: symbol.clone(),
                price: 10.0 * (n + 1) as f64,
                origin: QuoteOrigin::Live,
                fetched_at: Utc::now(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_seeds_polls_and_persists_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlist.json");
        let repository = Arc::new(JsonWatchlistRepository::new(&path));

        let mut coordinator = WatchlistCoordinator::new(
            Arc::new(StepQuotes { calls: AtomicU32::new(0) }),
            repository.clone(),
            50,
            Duration::from_secs(10),
        )
        .with_seed_symbols(vec!["aapl".to_string(), "".to_string()]);

        coordinator.start().await.unwrap();
        assert!(coordinator.is_running());

        let service = coordinator.service();
        assert_eq!(service.snapshot().symbols(), vec![Symbol::parse("AAPL").unwrap()]);
        service.set_threshold("AAPL", ThresholdKind::Max, Some(15.0)).unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        let alerts = service.drain_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].price, 20.0);

        coordinator.stop().await.unwrap();
        assert!(!coordinator.is_running());

        let saved = repository.load().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].thresholds.max, Some(15.0));
    }

    #[tokio::test]
    async fn test_start_restores_existing_watchlist_without_seeding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlist.json");
        std::fs::write(&path, r#"{"watchlist": ["MSFT"], "alerts": {"MSFT": {"min": 5}}}"#).unwrap();

        let mut coordinator = WatchlistCoordinator::new(
            Arc::new(StepQuotes { calls: AtomicU32::new(0) }),
            Arc::new(JsonWatchlistRepository::new(&path)),
            50,
            Duration::from_secs(10),
        )
        .with_seed_symbols(vec!["AAPL".to_string()]);

        coordinator.start().await.unwrap();
        let snapshot = coordinator.service().snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("MSFT").unwrap().thresholds.min, Some(5.0));

        coordinator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_storage_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlist.json");
        std::fs::write(&path, "garbage").unwrap();

        let mut coordinator = WatchlistCoordinator::new(
            Arc::new(StepQuotes { calls: AtomicU32::new(0) }),
            Arc::new(JsonWatchlistRepository::new(&path)),
            50,
            Duration::from_secs(10),
        );

        coordinator.start().await.unwrap();
        assert!(coordinator.service().snapshot().is_empty());
        coordinator.stop().await.unwrap();
    }
}

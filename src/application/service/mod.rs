// src/application/service/mod.rs
// Synchronous watchlist operations for a presentation layer

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

use crate::application::store::WatchlistStore;
use crate::application::usecase::{CycleReport, PriceUpdater};
use crate::domain::errors::{AppResult, PersistenceError, PersistenceResult, ValidationError};
use crate::domain::model::{AlertEvent, Symbol, ThresholdKind, WatchlistSnapshot};
use crate::domain::repository::{QuoteSource, WatchlistRepository};

/// Result of a mutating call. A failed save does not undo the change.
#[derive(Debug)]
pub struct MutationReport {
    pub symbol: Symbol,
    pub changed: bool,
    pub persistence: Option<PersistenceError>,
}

impl MutationReport {
    pub fn is_persisted(&self) -> bool {
        self.persistence.is_none()
    }
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Completed(CycleReport),
    /// Another cycle held the store, nothing was fetched
    Skipped,
}

impl RefreshOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, RefreshOutcome::Skipped)
    }
}

pub struct WatchlistService {
    store: Arc<WatchlistStore>,
    updater: Arc<PriceUpdater>,
    repository: Arc<dyn WatchlistRepository>,
    // Orders snapshot + write pairs so an older snapshot never lands last
    save_lock: Mutex<()>,
}

impl WatchlistService {
    pub fn new(updater: Arc<PriceUpdater>, repository: Arc<dyn WatchlistRepository>) -> Self {
        Self {
            store: updater.store().clone(),
            updater,
            repository,
            save_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<WatchlistStore> {
        &self.store
    }

    pub fn updater(&self) -> &Arc<PriceUpdater> {
        &self.updater
    }

    /// Populate the store from durable storage. Returns how many symbols
    /// were added.
    pub fn load(&self) -> PersistenceResult<usize> {
        let saved = self.repository.load()?;
        let added = self.store.restore(saved);
        log::info!("Loaded {} symbols from storage", added);
        Ok(added)
    }

    /// Write the current watchlist, outside any store lock
    pub fn save(&self) -> PersistenceResult<()> {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let saved = self.store.saved_symbols();
        self.repository.save(&saved)
    }

    fn persist(&self) -> Option<PersistenceError> {
        match self.save() {
            Ok(()) => None,
            Err(e) => {
                log::warn!("Failed to save watchlist, continuing in memory: {}", e);
                Some(e)
            }
        }
    }

    fn report(&self, symbol: Symbol, changed: bool) -> MutationReport {
        let persistence = if changed { self.persist() } else { None };
        MutationReport {
            symbol,
            changed,
            persistence,
        }
    }

    /// Watch a symbol and fetch its first price. Adding a symbol that is
    /// already watched changes nothing.
    pub async fn add_symbol(&self, raw: &str) -> AppResult<MutationReport> {
        let symbol = Symbol::parse(raw)?;
        if !self.store.add(&symbol) {
            log::debug!("{} already in watchlist", symbol);
            return Ok(self.report(symbol, false));
        }
        log::info!("Added {} to watchlist", symbol);

        match self.updater.quotes().fetch(&symbol).await {
            Ok(quote) => {
                if self.store.apply_initial_quote(&symbol, quote.price).is_none() {
                    log::debug!("Dropped initial quote for {}, already refreshed", symbol);
                }
            }
            Err(e) => log::warn!("Initial fetch for {} failed: {}", symbol, e),
        }

        Ok(self.report(symbol, true))
    }

    pub fn remove_symbol(&self, raw: &str) -> AppResult<MutationReport> {
        let symbol = Symbol::parse(raw)?;
        let removed = self.store.remove(&symbol);
        if removed {
            log::info!("Removed {} from watchlist", symbol);
        } else {
            log::debug!("{} not in watchlist", symbol);
        }
        Ok(self.report(symbol, removed))
    }

    pub fn set_min_threshold(&self, raw: &str, value: f64) -> AppResult<MutationReport> {
        self.set_threshold(raw, ThresholdKind::Min, Some(value))
    }

    pub fn set_max_threshold(&self, raw: &str, value: f64) -> AppResult<MutationReport> {
        self.set_threshold(raw, ThresholdKind::Max, Some(value))
    }

    pub fn clear_threshold(&self, raw: &str, kind: ThresholdKind) -> AppResult<MutationReport> {
        self.set_threshold(raw, kind, None)
    }

    /// Overwrite a threshold, `None` disables it
    pub fn set_threshold(
        &self,
        raw: &str,
        kind: ThresholdKind,
        value: Option<f64>,
    ) -> AppResult<MutationReport> {
        let symbol = Symbol::parse(raw)?;
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(ValidationError::InvalidThreshold(v).into());
            }
        }

        let previous = self.store.set_threshold(&symbol, kind, value)?;
        log::info!("{} {} threshold: {:?} -> {:?}", symbol, kind, previous, value);
        Ok(self.report(symbol, previous != value))
    }

    /// Refresh every symbol now, unless a cycle is already running
    pub async fn refresh_now(&self) -> RefreshOutcome {
        let Some(_cycle) = self.store.try_begin_cycle() else {
            log::debug!("Refresh skipped, a cycle is already running");
            return RefreshOutcome::Skipped;
        };

        RefreshOutcome::Completed(self.updater.run_cycle().await)
    }

    pub fn snapshot(&self) -> WatchlistSnapshot {
        self.store.snapshot()
    }

    pub fn try_snapshot(&self) -> Option<WatchlistSnapshot> {
        self.store.try_snapshot()
    }

    pub fn drain_alerts(&self) -> Vec<AlertEvent> {
        self.store.drain_alerts()
    }

    pub fn pending_alerts(&self) -> Vec<AlertEvent> {
        self.store.pending_alerts()
    }

    pub fn acknowledge_alerts(&self) -> usize {
        self.store.acknowledge_alerts()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.store.subscribe_alerts()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.store.last_updated()
    }

    pub fn take_data_changed(&self) -> bool {
        self.store.take_data_changed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{AppError, QuoteError, QuoteResult};
    use crate::domain::model::{AlertKind, Quote, QuoteOrigin, SavedSymbol, Thresholds};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::mpsc;
    use std::thread;

    /// Price rises by one on every fetch
    struct RisingQuotes {
        calls: AtomicU32,
    }

    #[async_trait]
    impl QuoteSource for RisingQuotes {
        async fn fetch(&self, symbol: &Symbol) -> QuoteResult<Quote> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Quote {
                symbol: symbol.clone(),
                price: 100.0 + n as f64,
                origin: QuoteOrigin::Live,
                fetched_at: Utc::now(),
            })
        }
    }

    struct DownQuotes;

    #[async_trait]
    impl QuoteSource for DownQuotes {
        async fn fetch(&self, _symbol: &Symbol) -> QuoteResult<Quote> {
            Err(QuoteError::Request("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct MemoryRepository {
        saved: Mutex<Vec<SavedSymbol>>,
        saves: AtomicU32,
        broken: bool,
    }

    impl WatchlistRepository for MemoryRepository {
        fn save(&self, entries: &[SavedSymbol]) -> PersistenceResult<()> {
            if self.broken {
                return Err(PersistenceError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.saved.lock().unwrap() = entries.to_vec();
            Ok(())
        }

        fn load(&self) -> PersistenceResult<Vec<SavedSymbol>> {
            Ok(self.saved.lock().unwrap().clone())
        }
    }

    /// Holds its first save until released
    struct GatedRepository {
        saved: Mutex<Vec<SavedSymbol>>,
        gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl WatchlistRepository for GatedRepository {
        fn save(&self, entries: &[SavedSymbol]) -> PersistenceResult<()> {
            let gate = self.gate.lock().unwrap().take();
            if let Some((entered, release)) = gate {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
            *self.saved.lock().unwrap() = entries.to_vec();
            Ok(())
        }

        fn load(&self) -> PersistenceResult<Vec<SavedSymbol>> {
            Ok(self.saved.lock().unwrap().clone())
        }
    }

    fn service_with(
        quotes: Arc<dyn QuoteSource>,
        repository: Arc<MemoryRepository>,
    ) -> WatchlistService {
        let store = Arc::new(WatchlistStore::default());
        let updater = Arc::new(PriceUpdater::new(store, quotes));
        WatchlistService::new(updater, repository)
    }

    fn rising() -> Arc<dyn QuoteSource> {
        Arc::new(RisingQuotes { calls: AtomicU32::new(0) })
    }

    #[tokio::test]
    async fn test_add_normalizes_fetches_and_saves() {
        let repository = Arc::new(MemoryRepository::default());
        let service = service_with(rising(), repository.clone());

        let report = service.add_symbol("aapl").await.unwrap();
        assert!(report.changed);
        assert!(report.is_persisted());
        assert_eq!(report.symbol.as_str(), "AAPL");

        let snapshot = service.snapshot();
        let entry = snapshot.get("AAPL").unwrap();
        assert_eq!(entry.last_price, Some(100.0));
        assert!(entry.thresholds.is_empty());
        assert!(service.pending_alerts().is_empty());

        assert_eq!(repository.saved.lock().unwrap()[0].symbol.as_str(), "AAPL");
    }

    #[tokio::test]
    async fn test_add_duplicate_is_a_no_op() {
        let repository = Arc::new(MemoryRepository::default());
        let service = service_with(rising(), repository.clone());

        service.add_symbol("MSFT").await.unwrap();
        let report = service.add_symbol(" msft ").await.unwrap();
        assert!(!report.changed);
        assert_eq!(service.snapshot().len(), 1);
        assert_eq!(repository.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_empty_symbol() {
        let service = service_with(rising(), Arc::new(MemoryRepository::default()));

        let result = service.add_symbol("   ").await;
        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::EmptySymbol))
        ));
        assert!(service.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_add_survives_quote_outage() {
        let service = service_with(Arc::new(DownQuotes), Arc::new(MemoryRepository::default()));

        let report = service.add_symbol("TSLA").await.unwrap();
        assert!(report.changed);
        assert_eq!(service.snapshot().get("TSLA").unwrap().last_price, None);
    }

    #[tokio::test]
    async fn test_remove_missing_symbol_changes_nothing() {
        let repository = Arc::new(MemoryRepository::default());
        let service = service_with(rising(), repository.clone());

        let report = service.remove_symbol("NFLX").unwrap();
        assert!(!report.changed);
        assert_eq!(repository.saves.load(Ordering::SeqCst), 0);

        service.add_symbol("NFLX").await.unwrap();
        assert!(service.remove_symbol("nflx").unwrap().changed);
        assert!(repository.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_thresholds_validate_and_persist() {
        let repository = Arc::new(MemoryRepository::default());
        let service = service_with(rising(), repository.clone());
        service.add_symbol("AAPL").await.unwrap();

        assert!(service.set_min_threshold("AAPL", 90.0).unwrap().changed);
        assert!(service.set_max_threshold("AAPL", 110.0).unwrap().changed);
        assert!(!service.set_max_threshold("AAPL", 110.0).unwrap().changed);

        assert!(matches!(
            service.set_min_threshold("AAPL", f64::NAN),
            Err(AppError::Validation(ValidationError::InvalidThreshold(_)))
        ));
        assert!(matches!(
            service.set_min_threshold("AAPL", -1.0),
            Err(AppError::Validation(ValidationError::InvalidThreshold(_)))
        ));
        assert!(matches!(
            service.set_min_threshold("MSFT", 1.0),
            Err(AppError::Validation(ValidationError::UnknownSymbol(_)))
        ));

        assert_eq!(
            repository.saved.lock().unwrap()[0].thresholds,
            Thresholds { min: Some(90.0), max: Some(110.0) }
        );

        service.clear_threshold("AAPL", ThresholdKind::Min).unwrap();
        assert_eq!(
            repository.saved.lock().unwrap()[0].thresholds,
            Thresholds { min: None, max: Some(110.0) }
        );
    }

    #[test]
    fn test_overlapping_saves_leave_latest_state_on_disk() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let repository = Arc::new(GatedRepository {
            saved: Mutex::new(Vec::new()),
            gate: Mutex::new(Some((entered_tx, release_rx))),
        });

        let store = Arc::new(WatchlistStore::default());
        let updater = Arc::new(PriceUpdater::new(store, rising()));
        let service = Arc::new(WatchlistService::new(updater, repository.clone()));
        service.store().restore(vec![
            SavedSymbol {
                symbol: Symbol::parse("AAPL").unwrap(),
                thresholds: Thresholds::default(),
            },
            SavedSymbol {
                symbol: Symbol::parse("MSFT").unwrap(),
                thresholds: Thresholds::default(),
            },
        ]);

        let slow = {
            let service = service.clone();
            thread::spawn(move || service.set_min_threshold("AAPL", 150.0).unwrap())
        };
        entered_rx.recv().unwrap();

        let fast = {
            let service = service.clone();
            thread::spawn(move || service.remove_symbol("MSFT").unwrap())
        };
        thread::sleep(std::time::Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert!(slow.join().unwrap().is_persisted());
        assert!(fast.join().unwrap().is_persisted());

        let on_disk: Vec<String> = repository
            .load()
            .unwrap()
            .iter()
            .map(|saved| saved.symbol.to_string())
            .collect();
        assert_eq!(on_disk, vec!["AAPL"]);
        assert_eq!(repository.load().unwrap(), service.store().saved_symbols());
    }

    #[tokio::test]
    async fn test_save_failure_is_reported_not_fatal() {
        let repository = Arc::new(MemoryRepository {
            broken: true,
            ..Default::default()
        });
        let service = service_with(rising(), repository);

        let report = service.add_symbol("AMZN").await.unwrap();
        assert!(report.changed);
        assert!(matches!(report.persistence, Some(PersistenceError::Io(_))));
        assert_eq!(service.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_now_runs_a_cycle() {
        let service = service_with(rising(), Arc::new(MemoryRepository::default()));
        service.add_symbol("AAPL").await.unwrap();
        service.set_max_threshold("AAPL", 100.5).unwrap();

        match service.refresh_now().await {
            RefreshOutcome::Completed(report) => {
                assert_eq!(report.updated.len(), 1);
                assert_eq!(report.alert_count(), 1);
            }
            RefreshOutcome::Skipped => panic!("refresh should not be skipped"),
        }

        let alerts = service.drain_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::AboveMax);
        assert!(service.drain_alerts().is_empty());
        assert!(service.last_updated().is_some());
    }

    #[tokio::test]
    async fn test_refresh_now_skips_while_cycle_running() {
        let service = service_with(rising(), Arc::new(MemoryRepository::default()));
        service.add_symbol("AAPL").await.unwrap();

        let cycle = service.store().begin_cycle().await;
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            service.refresh_now(),
        )
        .await
        .expect("refresh must not block");
        assert!(outcome.is_skipped());
        assert_eq!(service.snapshot().get("AAPL").unwrap().history.len(), 1);

        drop(cycle);
        assert!(!service.refresh_now().await.is_skipped());
    }

    #[tokio::test]
    async fn test_load_restores_saved_watchlist() {
        let repository = Arc::new(MemoryRepository::default());
        *repository.saved.lock().unwrap() = vec![SavedSymbol {
            symbol: Symbol::parse("GOOGL").unwrap(),
            thresholds: Thresholds { min: Some(120.0), max: None },
        }];

        let service = service_with(rising(), repository);
        assert_eq!(service.load().unwrap(), 1);

        let snapshot = service.snapshot();
        assert_eq!(snapshot.get("GOOGL").unwrap().thresholds.min, Some(120.0));
    }

    #[tokio::test]
    async fn test_acknowledge_clears_pending_alerts() {
        let service = service_with(rising(), Arc::new(MemoryRepository::default()));
        service.add_symbol("AAPL").await.unwrap();
        service.set_max_threshold("AAPL", 100.5).unwrap();
        service.refresh_now().await;

        assert_eq!(service.pending_alerts().len(), 1);
        assert_eq!(service.acknowledge_alerts(), 1);
        assert!(service.pending_alerts().is_empty());
    }
}

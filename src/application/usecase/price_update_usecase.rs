// src/application/usecase/price_update_usecase.rs
// Price refresh cycle and the background poller

use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

use crate::application::store::WatchlistStore;
use crate::domain::errors::{AppError, AppResult};
use crate::domain::model::{AlertKind, PriceUpdate, Symbol};
use crate::domain::repository::QuoteSource;

/// Outcome of one refresh cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    pub updated: Vec<PriceUpdate>,
    pub failed: Vec<(Symbol, String)>,
}

impl CycleReport {
    pub fn alert_count(&self) -> usize {
        self.updated.iter().map(|update| update.alerts.len()).sum()
    }
}

/// Fetches a price for every watched symbol and installs it in the store
pub struct PriceUpdater {
    store: Arc<WatchlistStore>,
    quotes: Arc<dyn QuoteSource>,
}

impl PriceUpdater {
    pub fn new(store: Arc<WatchlistStore>, quotes: Arc<dyn QuoteSource>) -> Self {
        Self { store, quotes }
    }

    pub fn store(&self) -> &Arc<WatchlistStore> {
        &self.store
    }

    pub fn quotes(&self) -> &Arc<dyn QuoteSource> {
        &self.quotes
    }

    /// Run one cycle. Callers hold the store's cycle gate.
    ///
    /// Fetches run concurrently and outside the state lock; each result is
    /// applied under the lock on its own, so a failure for one symbol never
    /// affects the others.
    pub async fn run_cycle(&self) -> CycleReport {
        let symbols = self.store.symbols();
        let mut report = CycleReport::default();

        if symbols.is_empty() {
            self.store.mark_refreshed(Utc::now());
            return report;
        }

        let fetches = symbols.iter().map(|symbol| self.quotes.fetch(symbol));
        let results = join_all(fetches).await;

        for (symbol, result) in symbols.into_iter().zip(results) {
            match result {
                Ok(quote) => match self.store.apply_quote(&symbol, quote.price) {
                    Some(update) => {
                        log_update(&update);
                        report.updated.push(update);
                    }
                    None => {
                        log::debug!("{} removed while its quote was in flight", symbol);
                    }
                },
                Err(e) => {
                    log::error!("Failed to fetch price for {}: {}", symbol, e);
                    report.failed.push((symbol, e.to_string()));
                }
            }
        }

        self.store.mark_refreshed(Utc::now());
        report
    }
}

fn log_update(update: &PriceUpdate) {
    let fmt_price = |price: Option<f64>| {
        price
            .map(|p| format!("{:.4}", p))
            .unwrap_or_else(|| "n/a".to_string())
    };

    log::debug!(
        "{} old={} new={:.4} min={} max={} below_min={} above_max={}",
        update.symbol,
        fmt_price(update.old_price),
        update.new_price,
        fmt_price(update.thresholds.min),
        fmt_price(update.thresholds.max),
        update.alerts.iter().any(|a| a.kind == AlertKind::BelowMin),
        update.alerts.iter().any(|a| a.kind == AlertKind::AboveMax),
    );

    for alert in &update.alerts {
        log::info!("[ALERT] {}", alert.message);
    }
}

/// Background task running a refresh cycle on a fixed interval.
///
/// The first cycle runs one interval after `start`. `stop` prevents new
/// cycles and waits for an in-flight one to finish.
pub struct Poller {
    updater: Arc<PriceUpdater>,
    interval: Duration,
    shutdown_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(updater: Arc<PriceUpdater>, interval: Duration) -> Self {
        Self {
            updater,
            interval,
            shutdown_tx: None,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(&mut self) -> AppResult<()> {
        if self.is_running() {
            return Err(AppError::Poller("Poller already running".to_string()));
        }
        if self.interval.is_zero() {
            return Err(AppError::Poller("Poll interval must be positive".to_string()));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let updater = self.updater.clone();
        let interval = self.interval;

        self.handle = Some(tokio::spawn(run_loop(updater, interval, shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);

        log::info!("Poller started with {}s interval", interval.as_secs_f64());
        Ok(())
    }

    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::error!("Poller task ended abnormally: {}", e);
            }
            log::info!("Poller stopped");
        }
    }
}

async fn run_loop(
    updater: Arc<PriceUpdater>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick_count = 0u64;

    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let _cycle = updater.store().begin_cycle().await;
                if *shutdown_rx.borrow() {
                    break;
                }

                tick_count += 1;
                let report = updater.run_cycle().await;
                log::info!(
                    "Tick {}: {} updated, {} failed, {} alerts",
                    tick_count,
                    report.updated.len(),
                    report.failed.len(),
                    report.alert_count()
                );
            }
        }
    }
}

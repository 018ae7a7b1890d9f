// src/application/store/mod.rs
// Shared watchlist state

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tokio::sync::{broadcast, OwnedMutexGuard};

use crate::domain::errors::{ValidationError, ValidationResult};
use crate::domain::model::{
    AlertEvent, PriceUpdate, SavedSymbol, Symbol, ThresholdKind, WatchEntry, WatchlistSnapshot,
    MAX_HISTORY,
};
use crate::domain::service;

const ALERT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct WatchlistState {
    // Insertion order, drives display and iteration
    order: Vec<Symbol>,
    entries: HashMap<Symbol, WatchEntry>,
    alert_log: VecDeque<AlertEvent>,
    last_updated: Option<DateTime<Utc>>,
    data_changed: bool,
}

/// Watchlist state guarded by a single lock.
///
/// Every method takes the lock for its own critical section only, so no
/// caller ever observes a half-applied change. Refresh cycles are
/// serialised separately through the cycle gate, which is held across the
/// network fetches of a whole cycle without blocking readers.
pub struct WatchlistStore {
    state: Mutex<WatchlistState>,
    cycle_gate: Arc<tokio::sync::Mutex<()>>,
    alert_tx: broadcast::Sender<AlertEvent>,
    history_capacity: usize,
}

impl WatchlistStore {
    pub fn new(history_capacity: usize) -> Self {
        let (alert_tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);

        Self {
            state: Mutex::new(WatchlistState::default()),
            cycle_gate: Arc::new(tokio::sync::Mutex::new(())),
            alert_tx,
            history_capacity: history_capacity.clamp(1, MAX_HISTORY),
        }
    }

    // Sections never leave state half-written, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, WatchlistState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a symbol with empty history and disabled thresholds.
    /// Returns false if it was already watched.
    pub fn add(&self, symbol: &Symbol) -> bool {
        let mut state = self.lock();
        if state.entries.contains_key(symbol) {
            return false;
        }

        state.order.push(symbol.clone());
        state.entries.insert(symbol.clone(), WatchEntry::new(symbol.clone()));
        state.data_changed = true;
        true
    }

    /// Install persisted symbols and thresholds, skipping ones already
    /// present. Returns how many were added.
    pub fn restore(&self, saved: Vec<SavedSymbol>) -> usize {
        let mut state = self.lock();
        let mut added = 0;

        for SavedSymbol { symbol, thresholds } in saved {
            if state.entries.contains_key(&symbol) {
                continue;
            }
            state.order.push(symbol.clone());
            state
                .entries
                .insert(symbol.clone(), WatchEntry::with_thresholds(symbol, thresholds));
            added += 1;
        }

        if added > 0 {
            state.data_changed = true;
        }
        added
    }

    /// Purge a symbol and all of its state. Returns false if absent.
    pub fn remove(&self, symbol: &Symbol) -> bool {
        let mut state = self.lock();
        if state.entries.remove(symbol).is_none() {
            return false;
        }

        state.order.retain(|s| s != symbol);
        state.data_changed = true;
        true
    }

    /// Overwrite one threshold, `None` disables it. Returns the previous value.
    pub fn set_threshold(
        &self,
        symbol: &Symbol,
        kind: ThresholdKind,
        value: Option<f64>,
    ) -> ValidationResult<Option<f64>> {
        let mut state = self.lock();
        let entry = state
            .entries
            .get_mut(symbol)
            .ok_or_else(|| ValidationError::UnknownSymbol(symbol.to_string()))?;

        let previous = entry.thresholds.get(kind);
        entry.thresholds.set(kind, value);
        state.data_changed = true;
        Ok(previous)
    }

    /// Record a new price and append it to the bounded history.
    /// Returns the prior price, `None` on first observation.
    pub fn update_price(&self, symbol: &Symbol, price: f64) -> ValidationResult<Option<f64>> {
        let mut state = self.lock();
        let capacity = self.history_capacity;
        let entry = state
            .entries
            .get_mut(symbol)
            .ok_or_else(|| ValidationError::UnknownSymbol(symbol.to_string()))?;

        let old_price = entry.record_price(price, capacity);
        state.data_changed = true;
        Ok(old_price)
    }

    /// Install a price and evaluate alerts against the thresholds as they
    /// are at that moment, in one critical section. Crossings are appended
    /// to the alert log and broadcast. Returns `None` if the symbol was
    /// removed while its quote was in flight.
    pub fn apply_quote(&self, symbol: &Symbol, price: f64) -> Option<PriceUpdate> {
        self.install_price(symbol, price, false)
    }

    /// Like `apply_quote`, but only for a symbol that has never been priced.
    /// A quote fetched before a refresh cycle priced the symbol is stale and
    /// is dropped.
    pub fn apply_initial_quote(&self, symbol: &Symbol, price: f64) -> Option<PriceUpdate> {
        self.install_price(symbol, price, true)
    }

    fn install_price(&self, symbol: &Symbol, price: f64, first_only: bool) -> Option<PriceUpdate> {
        let update = {
            let mut state = self.lock();
            let capacity = self.history_capacity;
            let entry = state.entries.get_mut(symbol)?;
            if first_only && entry.last_price.is_some() {
                return None;
            }

            let old_price = entry.record_price(price, capacity);
            let thresholds = entry.thresholds;
            let alerts = service::evaluate(symbol, old_price, price, thresholds);

            state.alert_log.extend(alerts.iter().cloned());
            state.data_changed = true;

            PriceUpdate {
                symbol: symbol.clone(),
                old_price,
                new_price: price,
                thresholds,
                alerts,
            }
        };

        for alert in &update.alerts {
            // No receivers is fine, the alert log still holds the event
            if self.alert_tx.send(alert.clone()).is_err() {
                log::debug!("No alert subscribers for {}", alert.symbol);
            }
        }

        Some(update)
    }

    /// Stamp the end of a refresh cycle
    pub fn mark_refreshed(&self, at: DateTime<Utc>) {
        let mut state = self.lock();
        state.last_updated = Some(at);
        state.data_changed = true;
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().order.is_empty()
    }

    pub fn saved_symbols(&self) -> Vec<SavedSymbol> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|symbol| state.entries.get(symbol))
            .map(|entry| SavedSymbol {
                symbol: entry.symbol.clone(),
                thresholds: entry.thresholds,
            })
            .collect()
    }

    pub fn snapshot(&self) -> WatchlistSnapshot {
        Self::build_snapshot(&self.lock())
    }

    /// Non-blocking snapshot, `None` while the lock is held elsewhere
    pub fn try_snapshot(&self) -> Option<WatchlistSnapshot> {
        match self.state.try_lock() {
            Ok(state) => Some(Self::build_snapshot(&state)),
            Err(TryLockError::Poisoned(poisoned)) => {
                Some(Self::build_snapshot(&poisoned.into_inner()))
            }
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn build_snapshot(state: &WatchlistState) -> WatchlistSnapshot {
        WatchlistSnapshot {
            entries: state
                .order
                .iter()
                .filter_map(|symbol| state.entries.get(symbol).cloned())
                .collect(),
            last_updated: state.last_updated,
        }
    }

    /// Return and clear all pending alerts, oldest first
    pub fn drain_alerts(&self) -> Vec<AlertEvent> {
        self.lock().alert_log.drain(..).collect()
    }

    pub fn pending_alerts(&self) -> Vec<AlertEvent> {
        self.lock().alert_log.iter().cloned().collect()
    }

    /// Clear pending alerts, returning how many were dismissed
    pub fn acknowledge_alerts(&self) -> usize {
        let mut state = self.lock();
        let count = state.alert_log.len();
        state.alert_log.clear();
        count
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_tx.subscribe()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.lock().last_updated
    }

    /// Read and reset the "data changed" flag
    pub fn take_data_changed(&self) -> bool {
        std::mem::take(&mut self.lock().data_changed)
    }

    /// Wait for exclusive use of the refresh cycle
    pub async fn begin_cycle(&self) -> OwnedMutexGuard<()> {
        self.cycle_gate.clone().lock_owned().await
    }

    /// Claim the refresh cycle without waiting, `None` if one is running
    pub fn try_begin_cycle(&self) -> Option<OwnedMutexGuard<()>> {
        self.cycle_gate.clone().try_lock_owned().ok()
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let state = self.lock();
        assert_eq!(state.order.len(), state.entries.len());
        for (i, symbol) in state.order.iter().enumerate() {
            assert!(state.entries.contains_key(symbol), "orphaned symbol {}", symbol);
            assert!(!state.order[i + 1..].contains(symbol), "duplicate symbol {}", symbol);
        }
    }
}

impl Default for WatchlistStore {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

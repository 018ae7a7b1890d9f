// src/domain/repository/mod.rs
// Repository interfaces for domain entities

use async_trait::async_trait;

use crate::domain::errors::{PersistenceResult, QuoteResult};
use crate::domain::model::{Quote, SavedSymbol, Symbol};

/// Source of current prices
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the current price for a symbol
    async fn fetch(&self, symbol: &Symbol) -> QuoteResult<Quote>;
}

/// Durable storage for the watchlist and its thresholds
pub trait WatchlistRepository: Send + Sync {
    fn save(&self, entries: &[SavedSymbol]) -> PersistenceResult<()>;

    /// Missing storage yields an empty list
    fn load(&self) -> PersistenceResult<Vec<SavedSymbol>>;
}

// src/domain/mod.rs
pub mod errors;
pub mod model;
pub mod repository;
pub mod service;

// Re-export common types for convenience
pub use errors::{
    AppError, AppResult, PersistenceError, PersistenceResult, QuoteError, QuoteResult,
    ValidationError, ValidationResult,
};
pub use model::{
    AlertEvent, AlertKind, PriceUpdate, Quote, QuoteOrigin, SavedSymbol, Symbol, ThresholdKind,
    Thresholds, WatchEntry, WatchlistSnapshot, MAX_HISTORY,
};

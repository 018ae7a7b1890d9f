pub mod price_update_usecase;

// Re-export public API
pub use price_update_usecase::{CycleReport, Poller, PriceUpdater};

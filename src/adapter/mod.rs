pub mod coordinator;

pub use coordinator::WatchlistCoordinator;

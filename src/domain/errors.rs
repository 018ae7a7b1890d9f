// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Poller error: {0}")]
    Poller(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures talking to the quote endpoint. Recovered by the synthetic
/// fallback, never shown to the user.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Request error: {0}")]
    Request(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Fetch timed out after {0}ms")]
    Timeout(u128),

    #[error("Invalid price: {0}")]
    InvalidPrice(f64),
}

impl From<hyper::Error> for QuoteError {
    fn from(err: hyper::Error) -> Self {
        QuoteError::Request(err.to_string())
    }
}

/// Failures reading or writing the watchlist file. Surfaced as warnings,
/// the in-memory watchlist keeps running.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed watchlist file: {0}")]
    Parse(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Symbol must not be empty")]
    EmptySymbol,

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Symbol not in watchlist: {0}")]
    UnknownSymbol(String),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(f64),
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type QuoteResult<T> = Result<T, QuoteError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;
pub type ValidationResult<T> = Result<T, ValidationError>;

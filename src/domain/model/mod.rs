// src/domain/model/mod.rs
// Core domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::domain::errors::{ValidationError, ValidationResult};

/// Maximum number of prices retained per symbol.
pub const MAX_HISTORY: usize = 50;

const MAX_SYMBOL_LEN: usize = 31;

/// Normalized ticker identifier (uppercase, non-empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Trim and uppercase raw user input.
    ///
    /// Letters, digits and the separators used by common ticker notations
    /// (`BRK.B`, `^GSPC`, `EURUSD=X`, `BTC-USD`) are accepted.
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let valid_chars = normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
        if !valid_chars || normalized.len() > MAX_SYMBOL_LEN {
            return Err(ValidationError::InvalidSymbol(raw.to_string()));
        }

        Ok(Symbol(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    Min,
    Max,
}

impl fmt::Display for ThresholdKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ThresholdKind::Min => write!(f, "min"),
            ThresholdKind::Max => write!(f, "max"),
        }
    }
}

/// Alert thresholds for one symbol. `None` means disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Thresholds {
    pub fn get(&self, kind: ThresholdKind) -> Option<f64> {
        match kind {
            ThresholdKind::Min => self.min,
            ThresholdKind::Max => self.max,
        }
    }

    pub fn set(&mut self, kind: ThresholdKind, value: Option<f64>) {
        match kind {
            ThresholdKind::Min => self.min = value,
            ThresholdKind::Max => self.max = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// State tracked for one watched symbol
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEntry {
    pub symbol: Symbol,
    pub last_price: Option<f64>,
    pub history: VecDeque<f64>,
    pub thresholds: Thresholds,
}

impl WatchEntry {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            last_price: None,
            history: VecDeque::with_capacity(MAX_HISTORY),
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_thresholds(symbol: Symbol, thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            ..Self::new(symbol)
        }
    }

    /// Install a new price, evicting the oldest history value past
    /// `capacity`. Returns the previous price.
    pub fn record_price(&mut self, price: f64, capacity: usize) -> Option<f64> {
        let old_price = self.last_price.replace(price);
        self.history.push_back(price);
        while self.history.len() > capacity {
            self.history.pop_front();
        }
        old_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    BelowMin,
    AboveMax,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlertKind::BelowMin => write!(f, "BELOW_MIN"),
            AlertKind::AboveMax => write!(f, "ABOVE_MAX"),
        }
    }
}

/// A threshold crossing
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub symbol: Symbol,
    pub price: f64,
    pub threshold: f64,
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Where a quote came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteOrigin {
    Live,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub origin: QuoteOrigin,
    pub fetched_at: DateTime<Utc>,
}

/// Result of installing a fetched price for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub symbol: Symbol,
    pub old_price: Option<f64>,
    pub new_price: f64,
    /// Thresholds the price was evaluated against
    pub thresholds: Thresholds,
    pub alerts: Vec<AlertEvent>,
}

/// Durable part of a watch entry: membership, order and thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSymbol {
    pub symbol: Symbol,
    pub thresholds: Thresholds,
}

/// Immutable copy of the watchlist for read-only consumers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchlistSnapshot {
    pub entries: Vec<WatchEntry>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl WatchlistSnapshot {
    pub fn get(&self, symbol: &str) -> Option<&WatchEntry> {
        self.entries.iter().find(|entry| entry.symbol.as_str() == symbol)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.entries.iter().map(|entry| entry.symbol.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

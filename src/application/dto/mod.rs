// src/application/dto/mod.rs
// Wire and file formats

pub mod parser;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::model::{SavedSymbol, Thresholds};

/// Quote endpoint response body
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    pub global_quote: GlobalQuote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalQuote {
    /// Symbol echoed back by the endpoint
    #[serde(rename = "01. symbol", default)]
    pub symbol: Option<String>,

    /// Last traded price, as a decimal string
    #[serde(rename = "05. price")]
    pub price: String,
}

/// Persisted watchlist file
///
/// ```json
/// { "watchlist": ["AAPL"], "alerts": { "AAPL": { "min": 150.0, "max": 200.0 } } }
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchlistDocument {
    pub watchlist: Vec<String>,
    pub alerts: BTreeMap<String, ThresholdRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThresholdRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl From<Thresholds> for ThresholdRecord {
    fn from(thresholds: Thresholds) -> Self {
        Self {
            min: thresholds.min,
            max: thresholds.max,
        }
    }
}

impl WatchlistDocument {
    pub fn from_saved(entries: &[SavedSymbol]) -> Self {
        let watchlist = entries
            .iter()
            .map(|entry| entry.symbol.to_string())
            .collect();

        // Symbols without any threshold are left out of "alerts"
        let alerts = entries
            .iter()
            .filter(|entry| !entry.thresholds.is_empty())
            .map(|entry| (entry.symbol.to_string(), ThresholdRecord::from(entry.thresholds)))
            .collect();

        Self { watchlist, alerts }
    }
}

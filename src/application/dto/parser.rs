// src/application/dto/parser.rs
// Parsers for DTOs

use serde_json::Value;

use super::{GlobalQuoteResponse, WatchlistDocument};
use crate::domain::errors::{PersistenceError, PersistenceResult, QuoteError, QuoteResult};
use crate::domain::model::{SavedSymbol, Symbol, ThresholdKind, Thresholds};

/// Extract the price from a quote endpoint body
pub fn parse_quote_body(body: &str) -> QuoteResult<f64> {
    let response: GlobalQuoteResponse =
        serde_json::from_str(body).map_err(|e| QuoteError::Parse(e.to_string()))?;

    let raw = response.global_quote.price.trim();
    let price: f64 = raw
        .parse()
        .map_err(|e| QuoteError::Parse(format!("Invalid price {:?}: {}", raw, e)))?;

    if !price.is_finite() || price < 0.0 {
        return Err(QuoteError::InvalidPrice(price));
    }

    Ok(price)
}

/// Render the canonical watchlist file
pub fn render_watchlist_document(entries: &[SavedSymbol]) -> PersistenceResult<String> {
    let document = WatchlistDocument::from_saved(entries);
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Read a watchlist file leniently.
///
/// Only an unreadable document is an error. Bad symbols, duplicates and
/// non-numeric thresholds are skipped one by one. Files that carry
/// `min_alerts`/`max_alerts` instead of `alerts` are read too, with a
/// threshold of `0` meaning disabled.
pub fn parse_watchlist_document(contents: &str) -> PersistenceResult<Vec<SavedSymbol>> {
    let root: Value = serde_json::from_str(contents)?;
    let root = root
        .as_object()
        .ok_or_else(|| PersistenceError::Parse("document root is not an object".to_string()))?;

    let mut saved: Vec<SavedSymbol> = Vec::new();

    if let Some(list) = root.get("watchlist").and_then(Value::as_array) {
        for item in list {
            let Some(raw) = item.as_str() else {
                log::warn!("Skipping non-string watchlist entry: {}", item);
                continue;
            };

            match Symbol::parse(raw) {
                Ok(symbol) if saved.iter().any(|entry| entry.symbol == symbol) => {
                    log::warn!("Skipping duplicate watchlist entry: {}", symbol);
                }
                Ok(symbol) => saved.push(SavedSymbol {
                    symbol,
                    thresholds: Thresholds::default(),
                }),
                Err(e) => log::warn!("Skipping watchlist entry {:?}: {}", raw, e),
            }
        }
    }

    if let Some(alerts) = root.get("alerts").and_then(Value::as_object) {
        for (raw, record) in alerts {
            if let Some(entry) = find_entry(&mut saved, raw) {
                entry.thresholds.min = threshold_value(record.get("min"));
                entry.thresholds.max = threshold_value(record.get("max"));
            }
        }
    } else {
        apply_legacy_thresholds(root.get("min_alerts"), ThresholdKind::Min, &mut saved);
        apply_legacy_thresholds(root.get("max_alerts"), ThresholdKind::Max, &mut saved);
    }

    Ok(saved)
}

fn find_entry<'a>(saved: &'a mut [SavedSymbol], raw: &str) -> Option<&'a mut SavedSymbol> {
    let symbol = Symbol::parse(raw).ok()?;
    let entry = saved.iter_mut().find(|entry| entry.symbol == symbol);
    if entry.is_none() {
        log::debug!("Dropping thresholds for unwatched symbol {}", symbol);
    }
    entry
}

fn threshold_value(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn apply_legacy_thresholds(map: Option<&Value>, kind: ThresholdKind, saved: &mut [SavedSymbol]) {
    let Some(map) = map.and_then(Value::as_object) else {
        return;
    };

    for (raw, value) in map {
        let value = threshold_value(Some(value)).filter(|v| *v != 0.0);
        if let Some(entry) = find_entry(saved, raw) {
            entry.thresholds.set(kind, value);
        }
    }
}

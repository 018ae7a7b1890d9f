// src/domain/service/mod.rs
// Alert evaluation

use chrono::{DateTime, Utc};

use crate::domain::model::{AlertEvent, AlertKind, Symbol, Thresholds};

/// Compare the previous and new price against the thresholds.
///
/// Only crossings fire: `BelowMin` needs `old >= min && new < min`,
/// `AboveMax` needs `old <= max && new > max`. Nothing fires on the first
/// observation of a symbol.
pub fn evaluate(
    symbol: &Symbol,
    old_price: Option<f64>,
    new_price: f64,
    thresholds: Thresholds,
) -> Vec<AlertEvent> {
    evaluate_at(symbol, old_price, new_price, thresholds, Utc::now())
}

pub fn evaluate_at(
    symbol: &Symbol,
    old_price: Option<f64>,
    new_price: f64,
    thresholds: Thresholds,
    at: DateTime<Utc>,
) -> Vec<AlertEvent> {
    let Some(old_price) = old_price else {
        return Vec::new();
    };

    let mut alerts = Vec::new();

    if let Some(min) = thresholds.min {
        if old_price >= min && new_price < min {
            alerts.push(build_alert(symbol, new_price, min, AlertKind::BelowMin, at));
        }
    }

    if let Some(max) = thresholds.max {
        if old_price <= max && new_price > max {
            alerts.push(build_alert(symbol, new_price, max, AlertKind::AboveMax, at));
        }
    }

    alerts
}

/// Human readable alert line
pub fn format_alert(symbol: &Symbol, price: f64, threshold: f64, kind: AlertKind) -> String {
    match kind {
        AlertKind::BelowMin => format!(
            "Alert: {} price = {:.2} dropped below min = {:.2}",
            symbol, price, threshold
        ),
        AlertKind::AboveMax => format!(
            "Alert: {} price = {:.2} exceeded max = {:.2}",
            symbol, price, threshold
        ),
    }
}

fn build_alert(
    symbol: &Symbol,
    price: f64,
    threshold: f64,
    kind: AlertKind,
    at: DateTime<Utc>,
) -> AlertEvent {
    AlertEvent {
        symbol: symbol.clone(),
        price,
        threshold,
        kind,
        message: format_alert(symbol, price, threshold, kind),
        timestamp: at,
    }
}

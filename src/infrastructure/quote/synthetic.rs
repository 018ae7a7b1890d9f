// src/infrastructure/quote/synthetic.rs
// Pseudo-random price walk used when the quote endpoint is unavailable

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::domain::model::Symbol;

const MAX_STEP: f64 = 2.0;

/// Per-symbol random walk.
///
/// Each symbol starts at a base price in `[100, 200)` picked on first use,
/// then moves by a uniform step in `[-2, 2)` on every call, never below zero.
pub struct SyntheticPriceGenerator {
    rng: StdRng,
    last_prices: HashMap<Symbol, f64>,
}

impl SyntheticPriceGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic sequence for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            last_prices: HashMap::new(),
        }
    }

    pub fn next_price(&mut self, symbol: &Symbol) -> f64 {
        let rng = &mut self.rng;
        let price = self
            .last_prices
            .entry(symbol.clone())
            .or_insert_with(|| 100.0 + rng.gen_range(0..1000) as f64 / 10.0);

        *price = (*price + rng.gen_range(-MAX_STEP..MAX_STEP)).max(0.0);
        *price
    }
}

impl Default for SyntheticPriceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::engine::types::{OrderLevel, OrderbookData};

/// Inclusive price window applied to both ladders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub lo: f64,
    pub hi: f64,
}

impl PriceRange {
    pub const UNBOUNDED: PriceRange = PriceRange { lo: 0.0, hi: f64::INFINITY };
    /// Default slider extent.
    pub const FULL: PriceRange = PriceRange { lo: 0.0, hi: 100_000.0 };
    pub const FOCUS_HIGH_VOLUME: PriceRange = PriceRange { lo: 40_000.0, hi: 80_000.0 };

    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.lo <= price && price <= self.hi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub price_range: PriceRange,
    pub min_quantity: f64,
}

impl FilterParams {
    pub fn new(price_range: PriceRange, min_quantity: f64) -> Self {
        Self { price_range, min_quantity }
    }

    pub fn identity() -> Self {
        Self { price_range: PriceRange::UNBOUNDED, min_quantity: 0.0 }
    }

    pub fn retains(&self, level: &OrderLevel) -> bool {
        self.price_range.contains(level.price) && level.quantity >= self.min_quantity
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self { price_range: PriceRange::FULL, min_quantity: 0.0 }
    }
}

/// Derive the display snapshot. Order is preserved and `current_price`/`spread` are
/// copied from the source: they describe the market, not the visible window.
#[instrument(level = "trace", skip(snapshot), fields(symbol = %snapshot.symbol))]
pub fn filter(snapshot: &OrderbookData, params: &FilterParams) -> OrderbookData {
    let keep = |side: &[OrderLevel]| -> Vec<OrderLevel> {
        side.iter().filter(|l| params.retains(l)).copied().collect()
    };

    OrderbookData {
        symbol: snapshot.symbol.clone(),
        timestamp: snapshot.timestamp,
        bids: keep(&snapshot.bids),
        asks: keep(&snapshot.asks),
        current_price: snapshot.current_price,
        spread: snapshot.spread,
    }
}

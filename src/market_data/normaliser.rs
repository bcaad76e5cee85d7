// Validates raw venue quotes and merges them into one normalized snapshot.
// Validation happens here once; everything downstream trusts its input.
// `parse_level` is the entry point for wire adapters that receive string-encoded depth;
// the synthetic feed produces numbers directly and skips it.

use tracing::{debug, instrument, warn};

use crate::engine::types::{OrderLevel, OrderbookData, Venue};
use crate::market_data::adapters::{RawLevel, RawSnapshot};

pub const DEFAULT_MAX_DEPTH: usize = 50;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LevelError {
    #[error("price {0} is not finite")]
    NonFinitePrice(f64),
    #[error("price {0} is not positive")]
    NonPositivePrice(f64),
    #[error("quantity {0} is not finite")]
    NonFiniteQuantity(f64),
    #[error("quantity {0} is not positive")]
    NonPositiveQuantity(f64),
    #[error("cannot parse `{0}` as a number")]
    Unparseable(String),
}

/// Parse a wire-format `(px, sz)` pair, the way most venues send depth.
pub fn parse_level(px: &str, sz: &str, timestamp: u64) -> Result<RawLevel, LevelError> {
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| LevelError::Unparseable(s.to_string()))
    };
    Ok(RawLevel { price: parse(px)?, quantity: parse(sz)?, timestamp })
}

pub fn validate_level(raw: &RawLevel, venue: Venue) -> Result<OrderLevel, LevelError> {
    if !raw.price.is_finite() {
        return Err(LevelError::NonFinitePrice(raw.price));
    }
    if raw.price <= 0.0 {
        return Err(LevelError::NonPositivePrice(raw.price));
    }
    if !raw.quantity.is_finite() {
        return Err(LevelError::NonFiniteQuantity(raw.quantity));
    }
    if raw.quantity <= 0.0 {
        return Err(LevelError::NonPositiveQuantity(raw.quantity));
    }
    Ok(OrderLevel { price: raw.price, quantity: raw.quantity, venue, timestamp: raw.timestamp })
}

/// Mid price and spread, both absent unless each side has a best level.
pub fn derive_stats(bids: &[OrderLevel], asks: &[OrderLevel]) -> (Option<f64>, Option<f64>) {
    match (bids.first(), asks.first()) {
        (Some(bid), Some(ask)) => (Some((bid.price + ask.price) / 2.0), Some(ask.price - bid.price)),
        _ => (None, None),
    }
}

/// Result of ingesting one raw snapshot.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub snapshot: OrderbookData,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Normaliser {
    pub max_depth: usize,
}

impl Default for Normaliser {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl Normaliser {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Merge already-validated levels. Sorting is stable, so levels at the same price keep
    /// arrival order; truncation only happens after the merged sort.
    #[instrument(level = "trace", skip(self, bids, asks))]
    pub fn normalise(
        &self,
        symbol: &str,
        timestamp: u64,
        mut bids: Vec<OrderLevel>,
        mut asks: Vec<OrderLevel>,
    ) -> OrderbookData {
        bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        asks.sort_by(|a, b| a.price.total_cmp(&b.price));
        bids.truncate(self.max_depth);
        asks.truncate(self.max_depth);

        let (current_price, spread) = derive_stats(&bids, &asks);

        OrderbookData {
            symbol: symbol.to_string(),
            timestamp,
            bids,
            asks,
            current_price,
            spread,
        }
    }

    /// Validate every venue's levels, drop the malformed ones, then normalise.
    pub fn ingest(&self, raw: &RawSnapshot) -> Ingested {
        let mut bids = Vec::new();
        let mut asks = Vec::new();
        let mut rejected = 0usize;

        for quotes in &raw.venues {
            for (levels, out) in [(&quotes.bids, &mut bids), (&quotes.asks, &mut asks)] {
                for lvl in levels {
                    match validate_level(lvl, quotes.venue) {
                        Ok(level) => out.push(level),
                        Err(e) => {
                            rejected += 1;
                            debug!(venue = %quotes.venue, error = %e, "dropping malformed level");
                        }
                    }
                }
            }
        }

        if rejected > 0 {
            warn!(symbol = %raw.symbol, rejected, "dropped malformed levels");
            metrics::counter!("depthx_rejected_levels_total").increment(rejected as u64);
        }

        Ingested { snapshot: self.normalise(&raw.symbol, raw.timestamp, bids, asks), rejected }
    }
}

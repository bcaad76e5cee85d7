// Synthetic multi-venue feed. Stands in for live venue connections: every poll produces a
// fresh ladder per venue around a fixed base price.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use super::{now_ms, FeedError, RawLevel, RawSnapshot, SnapshotFeed, VenueQuotes};
use crate::engine::types::{Venue, VenueSet};

#[derive(Debug, Clone, Copy)]
pub struct SyntheticParams {
    pub base_price: f64,
    pub spread: f64,
    pub levels_per_venue: usize,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self { base_price: 65_000.0, spread: 50.0, levels_per_venue: 25 }
    }
}

pub struct SyntheticFeed {
    params: SyntheticParams,
    rng: Mutex<StdRng>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

impl SyntheticFeed {
    pub fn new(params: SyntheticParams) -> Self {
        Self { params, rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Reproducible feed for tests and replays.
    pub fn seeded(params: SyntheticParams, seed: u64) -> Self {
        Self { params, rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    fn side(&self, rng: &mut StdRng, is_ask: bool, now: u64) -> Vec<RawLevel> {
        let p = &self.params;
        let direction = if is_ask { 1.0 } else { -1.0 };
        let touch = p.base_price + direction * p.spread / 2.0;
        let n = p.levels_per_venue;

        (0..n)
            .map(|i| {
                let offset = (i as f64 * 10.0 + rng.gen_range(0.0..5.0)) * direction;
                // deeper levels carry less size on average
                let quantity = rng.gen_range(0.0..5.0) + 0.1 + (n - i) as f64 * 0.1;
                RawLevel {
                    price: round_to(touch + offset, 2),
                    quantity: round_to(quantity, 4),
                    timestamp: now.saturating_sub(i as u64 * 1000),
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SnapshotFeed for SyntheticFeed {
    async fn fetch_snapshot(&self, symbol: &str, venues: VenueSet) -> Result<RawSnapshot, FeedError> {
        if symbol.trim().is_empty() {
            return Err(FeedError::UnsupportedSymbol(symbol.to_string()));
        }

        let now = now_ms();
        let mut rng = self.rng.lock();
        let venues: Vec<VenueQuotes> = venues
            .iter()
            .map(|venue: Venue| VenueQuotes {
                venue,
                bids: self.side(&mut rng, false, now),
                asks: self.side(&mut rng, true, now),
            })
            .collect();

        trace!(symbol, venues = venues.len(), "generated synthetic snapshot");
        Ok(RawSnapshot { symbol: symbol.to_string(), timestamp: now, venues })
    }
}

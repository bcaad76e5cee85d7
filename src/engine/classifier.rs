//! Pressure zone classification.
//!
//! Levels are grouped into price buckets of width `W` (`round(price / W) * W`,
//! half away from zero), then each bucket is ranked by how much volume rests in it and
//! how many distinct venues contribute to it.

use std::cmp::Reverse;

use ahash::AHashMap;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use tracing::{debug, instrument, trace};

use crate::engine::types::{
    Intensity, OrderLevel, OrderbookData, PressureZone, PressureZoneSet, Side, VenueSet,
};

pub const DEFAULT_BUCKET_WIDTH: f64 = 100.0;

pub const HIGH_MIN_VOLUME: f64 = 5.0;
pub const HIGH_MIN_VENUES: usize = 3;
pub const MEDIUM_MIN_VOLUME: f64 = 2.0;
pub const MEDIUM_MIN_VENUES: usize = 2;

/// Tier for one bucket. `High` is checked first.
pub fn intensity_for(total_volume: f64, venue_count: usize) -> Intensity {
    if total_volume > HIGH_MIN_VOLUME && venue_count >= HIGH_MIN_VENUES {
        Intensity::High
    } else if total_volume > MEDIUM_MIN_VOLUME && venue_count >= MEDIUM_MIN_VENUES {
        Intensity::Medium
    } else {
        Intensity::Low
    }
}

#[derive(Debug, Default)]
struct Bucket {
    total_volume: f64,
    venues: VenueSet,
}

#[derive(Debug, Clone, Copy)]
pub struct PressureClassifier {
    bucket_width: f64,
}

impl Default for PressureClassifier {
    fn default() -> Self {
        Self { bucket_width: DEFAULT_BUCKET_WIDTH }
    }
}

impl PressureClassifier {
    /// `bucket_width` must be positive and finite; settings validation enforces this.
    pub fn new(bucket_width: f64) -> Self {
        debug_assert!(bucket_width.is_finite() && bucket_width > 0.0);
        Self { bucket_width }
    }

    pub fn bucket_width(&self) -> f64 {
        self.bucket_width
    }

    fn bucket_index(&self, price: f64) -> i64 {
        (price / self.bucket_width).round() as i64
    }

    /// Discretized price coordinate for `price`.
    pub fn bucket_level(&self, price: f64) -> f64 {
        self.bucket_index(price) as f64 * self.bucket_width
    }

    fn side_zones(&self, levels: &[OrderLevel], side: Side, active: VenueSet) -> Vec<PressureZone> {
        let mut buckets: AHashMap<i64, Bucket> = AHashMap::new();

        for level in levels.iter().filter(|l| active.contains(l.venue)) {
            let bucket = buckets.entry(self.bucket_index(level.price)).or_default();
            bucket.total_volume += level.quantity;
            bucket.venues.insert(level.venue);
        }

        trace!(?side, buckets = buckets.len(), "bucketed side");

        buckets
            .into_iter()
            .map(|(index, b)| PressureZone {
                price_level: index as f64 * self.bucket_width,
                intensity: intensity_for(b.total_volume, b.venues.len()),
                total_volume: b.total_volume,
                venues: b.venues,
                side,
            })
            .collect()
    }

    #[instrument(level = "debug", skip(self, snapshot), fields(symbol = %snapshot.symbol))]
    pub fn classify(&self, snapshot: &OrderbookData, active: VenueSet) -> PressureZoneSet {
        if active.is_empty() {
            return PressureZoneSet::default();
        }

        let zones = self
            .side_zones(&snapshot.bids, Side::Bid, active)
            .into_iter()
            .chain(self.side_zones(&snapshot.asks, Side::Ask, active));

        let mut tiers = zones.into_group_map_by(|z| z.intensity);
        let mut take = |intensity: Intensity| {
            let mut tier = tiers.remove(&intensity).unwrap_or_default();
            tier.sort_by_key(|z| {
                (Reverse(OrderedFloat(z.total_volume)), OrderedFloat(z.price_level), z.side)
            });
            tier
        };

        let set = PressureZoneSet {
            high: take(Intensity::High),
            medium: take(Intensity::Medium),
            low: take(Intensity::Low),
        };
        debug!(
            high = set.high.len(),
            medium = set.medium.len(),
            low = set.low.len(),
            "classified pressure zones"
        );
        set
    }
}

/// Classify with the default bucket width.
pub fn classify(snapshot: &OrderbookData, active: VenueSet) -> PressureZoneSet {
    PressureClassifier::default().classify(snapshot, active)
}

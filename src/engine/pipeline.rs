use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::engine::classifier::PressureClassifier;
use crate::engine::filter::{filter, FilterParams};
use crate::engine::types::{OrderbookData, PressureZoneSet, VenueSet};

/// Headline numbers for the statistics panel.
///
/// Best levels, mid and spread come from the unfiltered snapshot; the volume totals sum
/// the filtered ladder that is actually displayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStats {
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub current_price: Option<f64>,
    pub spread: Option<f64>,
    pub total_bid_volume: f64,
    pub total_ask_volume: f64,
    pub high_zones: usize,
    pub medium_zones: usize,
    pub low_zones: usize,
}

impl MarketStats {
    pub fn compute(source: &OrderbookData, display: &OrderbookData, zones: &PressureZoneSet) -> Self {
        Self {
            best_bid: source.best_bid().map(|l| l.price),
            best_ask: source.best_ask().map(|l| l.price),
            current_price: source.current_price,
            spread: source.spread,
            total_bid_volume: display.bids.iter().map(|l| l.quantity).sum(),
            total_ask_volume: display.asks.iter().map(|l| l.quantity).sum(),
            high_zones: zones.high.len(),
            medium_zones: zones.medium.len(),
            low_zones: zones.low.len(),
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthView {
    pub display: OrderbookData,
    pub zones: PressureZoneSet,
    pub stats: MarketStats,
    pub venues: VenueSet,
    pub connected: bool,
}

struct Memo<K, V> {
    key: K,
    value: V,
}

/// Explicit memoized pipeline: filter and classification are recomputed only when one of
/// their inputs changed since the last `view()`.
pub struct Pipeline {
    classifier: PressureClassifier,
    filter: FilterParams,
    venues: VenueSet,
    connected: bool,
    snapshot: Option<Arc<OrderbookData>>,
    // bumped on every new snapshot; stands in for snapshot identity
    generation: u64,
    display: Option<Memo<(u64, FilterParams), OrderbookData>>,
    zones: Option<Memo<(u64, VenueSet), PressureZoneSet>>,
    filter_runs: u64,
    classify_runs: u64,
}

impl Pipeline {
    pub fn new(classifier: PressureClassifier, filter: FilterParams, venues: VenueSet) -> Self {
        Self {
            classifier,
            filter,
            venues,
            connected: false,
            snapshot: None,
            generation: 0,
            display: None,
            zones: None,
            filter_runs: 0,
            classify_runs: 0,
        }
    }

    pub fn set_snapshot(&mut self, snapshot: Arc<OrderbookData>) {
        self.generation += 1;
        self.snapshot = Some(snapshot);
    }

    pub fn set_filter(&mut self, filter: FilterParams) {
        self.filter = filter;
    }

    pub fn set_venues(&mut self, venues: VenueSet) {
        self.venues = venues;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn filter_params(&self) -> FilterParams {
        self.filter
    }

    /// (filter runs, classifier runs) since construction.
    pub fn recompute_counts(&self) -> (u64, u64) {
        (self.filter_runs, self.classify_runs)
    }

    /// Current view, or `None` before the first snapshot arrives.
    #[instrument(level = "trace", skip(self), fields(generation = self.generation))]
    pub fn view(&mut self) -> Option<DepthView> {
        let snapshot = self.snapshot.clone()?;

        let display_key = (self.generation, self.filter);
        if self.display.as_ref().map_or(true, |m| m.key != display_key) {
            self.filter_runs += 1;
            self.display = Some(Memo { key: display_key, value: filter(&snapshot, &self.filter) });
        }

        let zones_key = (self.generation, self.venues);
        if self.zones.as_ref().map_or(true, |m| m.key != zones_key) {
            self.classify_runs += 1;
            self.zones = Some(Memo { key: zones_key, value: self.classifier.classify(&snapshot, self.venues) });
        }

        let display = self.display.as_ref().map(|m| m.value.clone())?;
        let zones = self.zones.as_ref().map(|m| m.value.clone())?;
        let stats = MarketStats::compute(&snapshot, &display, &zones);
        // `display` inside debug! resolves to tracing::field::display
        let (bids, asks, zone_count) = (display.bids.len(), display.asks.len(), zones.len());
        debug!(bids, asks, zones = zone_count, "pipeline view ready");

        Some(DepthView { display, zones, stats, venues: self.venues, connected: self.connected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::filter::PriceRange;
    use crate::engine::types::{OrderLevel, Venue};
    use crate::market_data::normaliser::Normaliser;

    fn level(price: f64, quantity: f64, venue: Venue) -> OrderLevel {
        OrderLevel { price, quantity, venue, timestamp: 0 }
    }

    fn snapshot() -> Arc<OrderbookData> {
        Arc::new(Normaliser::default().normalise(
            "BTC-USD",
            1,
            vec![
                level(64_990.0, 3.0, Venue::Binance),
                level(64_980.0, 3.0, Venue::Okx),
                level(64_700.0, 0.05, Venue::Bybit),
            ],
            vec![level(65_010.0, 1.0, Venue::Deribit), level(65_300.0, 0.5, Venue::Okx)],
        ))
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(PressureClassifier::default(), FilterParams::identity(), VenueSet::all())
    }

    #[test]
    fn no_view_before_first_snapshot() {
        assert!(pipeline().view().is_none());
    }

    #[test]
    fn repeated_views_do_not_recompute() {
        let mut p = pipeline();
        p.set_snapshot(snapshot());
        let first = p.view().unwrap();
        let second = p.view().unwrap();
        assert_eq!(first, second);
        assert_eq!(p.recompute_counts(), (1, 1));
    }

    #[test]
    fn filter_change_skips_classification() {
        let mut p = pipeline();
        p.set_snapshot(snapshot());
        p.view();
        p.set_filter(FilterParams::new(PriceRange::UNBOUNDED, 0.1));
        let view = p.view().unwrap();
        assert_eq!(p.recompute_counts(), (2, 1));
        assert_eq!(view.display.bids.len(), 2);
        // zones still see the unfiltered ladder
        let total: f64 = view.zones.iter().map(|z| z.total_volume).sum();
        assert!((total - 7.55).abs() < 1e-9);
    }

    #[test]
    fn venue_change_skips_filtering() {
        let mut p = pipeline();
        p.set_snapshot(snapshot());
        p.view();
        p.set_venues([Venue::Okx].into_iter().collect());
        let view = p.view().unwrap();
        assert_eq!(p.recompute_counts(), (1, 2));
        assert!(view.zones.iter().all(|z| z.venues.contains(Venue::Okx) && z.venues.len() == 1));
    }

    #[test]
    fn new_snapshot_recomputes_both() {
        let mut p = pipeline();
        p.set_snapshot(snapshot());
        p.view();
        p.set_snapshot(snapshot());
        p.view();
        assert_eq!(p.recompute_counts(), (2, 2));
    }

    #[test]
    fn stats_follow_source_for_prices_and_display_for_volume() {
        let mut p = pipeline();
        p.set_snapshot(snapshot());
        p.set_filter(FilterParams::new(PriceRange::new(65_000.0, 65_100.0), 0.0));
        let view = p.view().unwrap();
        let stats = &view.stats;
        assert_eq!(stats.best_bid, Some(64_990.0));
        assert_eq!(stats.best_ask, Some(65_010.0));
        assert_eq!(stats.current_price, Some(65_000.0));
        assert_eq!(stats.spread, Some(20.0));
        assert_eq!(stats.total_bid_volume, 0.0);
        assert_eq!(stats.total_ask_volume, 1.0);
        assert_eq!(stats.medium_zones, 1);
        assert_eq!(stats.high_zones + stats.medium_zones + stats.low_zones, view.zones.len());
    }

    #[test]
    fn connectivity_flag_does_not_drop_snapshot() {
        let mut p = pipeline();
        p.set_snapshot(snapshot());
        p.set_connected(false);
        let view = p.view().unwrap();
        assert!(!view.connected);
        assert_eq!(view.display.bids.len(), 3);
    }
}

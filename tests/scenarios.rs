//! End-to-end scenarios: raw venue quotes through ingestion, filtering and classification.

use depthx_rs::engine::classifier::classify;
use depthx_rs::engine::filter::{filter, FilterParams, PriceRange};
use depthx_rs::engine::types::{Intensity, Side, Venue, VenueSet};
use depthx_rs::market_data::adapters::{RawLevel, RawSnapshot, VenueQuotes};
use depthx_rs::market_data::normaliser::Normaliser;

fn raw(price: f64, quantity: f64) -> RawLevel {
    RawLevel { price, quantity, timestamp: 1_700_000_000_000 }
}

fn quotes(venue: Venue, bids: Vec<RawLevel>, asks: Vec<RawLevel>) -> VenueQuotes {
    VenueQuotes { venue, bids, asks }
}

fn ingest(venues: Vec<VenueQuotes>) -> depthx_rs::engine::types::OrderbookData {
    let raw = RawSnapshot { symbol: "BTC-USD".into(), timestamp: 1, venues };
    Normaliser::default().ingest(&raw).snapshot
}

#[test]
fn shared_bucket_across_two_venues_is_medium() {
    let snapshot = ingest(vec![
        quotes(Venue::Binance, vec![raw(65_000.0, 3.0)], vec![]),
        quotes(Venue::Okx, vec![raw(65_000.0, 3.0)], vec![]),
        quotes(Venue::Bybit, vec![raw(65_100.0, 1.0)], vec![]),
    ]);
    let active: VenueSet = [Venue::Binance, Venue::Okx, Venue::Bybit].into_iter().collect();
    let zones = classify(&snapshot, active);

    assert!(zones.high.is_empty());
    assert_eq!(zones.medium.len(), 1);
    assert_eq!(zones.medium[0].price_level, 65_000.0);
    assert_eq!(zones.medium[0].total_volume, 6.0);
    assert_eq!(zones.medium[0].venues.len(), 2);
    assert_eq!(zones.low.len(), 1);
    assert_eq!(zones.low[0].price_level, 65_100.0);
    assert_eq!(zones.low[0].intensity, Intensity::Low);
}

#[test]
fn quantity_filter_empties_asks_but_keeps_mid() {
    let snapshot = ingest(vec![quotes(
        Venue::Binance,
        vec![raw(69_900.0, 1.0)],
        vec![raw(70_000.0, 0.05)],
    )]);
    let shown = filter(&snapshot, &FilterParams::new(PriceRange::UNBOUNDED, 0.1));

    assert!(shown.asks.is_empty());
    assert_eq!(shown.bids.len(), 1);
    assert_eq!(shown.current_price, Some(69_950.0));
    assert_eq!(shown.current_price, snapshot.current_price);
    assert_eq!(shown.spread, snapshot.spread);
}

#[test]
fn no_active_venues_means_no_zones() {
    let snapshot = ingest(vec![quotes(
        Venue::Deribit,
        vec![raw(64_950.0, 2.0)],
        vec![raw(65_050.0, 2.0)],
    )]);
    let zones = classify(&snapshot, VenueSet::empty());
    assert!(zones.high.is_empty() && zones.medium.is_empty() && zones.low.is_empty());
}

#[test]
fn one_sided_book_has_no_stats_but_still_has_bid_zones() {
    let snapshot = ingest(vec![
        quotes(Venue::Binance, vec![raw(64_990.0, 2.0)], vec![]),
        quotes(Venue::Okx, vec![raw(64_960.0, 2.0)], vec![]),
        quotes(Venue::Bybit, vec![raw(65_020.0, 2.0)], vec![]),
    ]);
    assert!(snapshot.asks.is_empty());
    assert_eq!(snapshot.current_price, None);
    assert_eq!(snapshot.spread, None);

    let zones = classify(&snapshot, VenueSet::all());
    assert_eq!(zones.high.len(), 1);
    assert_eq!(zones.high[0].side, Side::Bid);
    assert_eq!(zones.high[0].price_level, 65_000.0);
}

#[test]
fn equal_volume_zones_order_by_price() {
    let snapshot = ingest(vec![
        quotes(Venue::Binance, vec![raw(64_800.0, 1.5)], vec![raw(65_400.0, 1.5)]),
        quotes(Venue::Okx, vec![raw(64_600.0, 1.5)], vec![]),
    ]);
    let zones = classify(&snapshot, VenueSet::all());
    let levels: Vec<f64> = zones.low.iter().map(|z| z.price_level).collect();
    assert_eq!(levels, vec![64_600.0, 64_800.0, 65_400.0]);
}

#[test]
fn malformed_levels_never_reach_the_ladder() {
    let snapshot = ingest(vec![quotes(
        Venue::Bybit,
        vec![raw(f64::NAN, 1.0), raw(64_900.0, -1.0), raw(64_950.0, 1.0)],
        vec![raw(0.0, 1.0), raw(65_050.0, f64::INFINITY)],
    )]);
    assert_eq!(snapshot.bids.len(), 1);
    assert!(snapshot.asks.is_empty());
    assert_eq!(classify(&snapshot, VenueSet::all()).len(), 1);
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Venues that can contribute quotes. Every lookup below is an exhaustive `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Binance,
    Okx,
    Bybit,
    Deribit,
}

impl Venue {
    pub const ALL: [Venue; 4] = [Venue::Binance, Venue::Okx, Venue::Bybit, Venue::Deribit];

    pub fn key(self) -> &'static str {
        match self {
            Venue::Binance => "binance",
            Venue::Okx => "okx",
            Venue::Bybit => "bybit",
            Venue::Deribit => "deribit",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Venue::Binance => "Binance",
            Venue::Okx => "OKX",
            Venue::Bybit => "Bybit",
            Venue::Deribit => "Deribit",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Venue::Binance => 1 << 0,
            Venue::Okx => 1 << 1,
            Venue::Bybit => 1 << 2,
            Venue::Deribit => 1 << 3,
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown venue `{0}`")]
pub struct UnknownVenue(pub String);

impl FromStr for Venue {
    type Err = UnknownVenue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Venue::Binance),
            "okx" => Ok(Venue::Okx),
            "bybit" => Ok(Venue::Bybit),
            "deribit" => Ok(Venue::Deribit),
            other => Err(UnknownVenue(other.to_string())),
        }
    }
}

/// Set of venues packed into a bitmask. Iteration order is `Venue::ALL` order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VenueSet(u8);

impl VenueSet {
    pub const fn empty() -> Self {
        VenueSet(0)
    }

    pub fn all() -> Self {
        Venue::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, venue: Venue) -> bool {
        let had = self.contains(venue);
        self.0 |= venue.bit();
        !had
    }

    pub fn remove(&mut self, venue: Venue) -> bool {
        let had = self.contains(venue);
        self.0 &= !venue.bit();
        had
    }

    /// Flip membership, returning whether the venue is now selected.
    pub fn toggle(&mut self, venue: Venue) -> bool {
        self.0 ^= venue.bit();
        self.contains(venue)
    }

    pub fn contains(&self, venue: Venue) -> bool {
        self.0 & venue.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_superset(&self, other: &VenueSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Venue> + '_ {
        Venue::ALL.into_iter().filter(move |v| self.contains(*v))
    }
}

impl FromIterator<Venue> for VenueSet {
    fn from_iter<I: IntoIterator<Item = Venue>>(iter: I) -> Self {
        let mut set = VenueSet::empty();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

impl fmt::Debug for VenueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for VenueSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for VenueSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let venues = Vec::<Venue>::deserialize(deserializer)?;
        Ok(venues.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

// One resting order at a venue, already validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderLevel {
    pub price: f64,
    pub quantity: f64,
    pub venue: Venue,
    pub timestamp: u64,
}

/// One normalized snapshot for a symbol.
///
/// `bids` best (highest) first, `asks` best (lowest) first. `current_price` and `spread`
/// are `None` whenever either side is empty; they are never zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookData {
    pub symbol: String,
    pub timestamp: u64,
    pub bids: Vec<OrderLevel>,
    pub asks: Vec<OrderLevel>,
    pub current_price: Option<f64>,
    pub spread: Option<f64>,
}

impl OrderbookData {
    pub fn best_bid(&self) -> Option<&OrderLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderLevel> {
        self.asks.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureZone {
    pub price_level: f64,
    pub intensity: Intensity,
    pub total_volume: f64,
    pub venues: VenueSet,
    pub side: Side,
}

/// Every computed zone lands in exactly one tier. Each tier is ordered by
/// descending `total_volume`, then ascending `price_level`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureZoneSet {
    pub high: Vec<PressureZone>,
    pub medium: Vec<PressureZone>,
    pub low: Vec<PressureZone>,
}

impl PressureZoneSet {
    pub fn tier(&self, intensity: Intensity) -> &[PressureZone] {
        match intensity {
            Intensity::High => &self.high,
            Intensity::Medium => &self.medium,
            Intensity::Low => &self.low,
        }
    }

    /// Strongest `n` zones of one tier.
    pub fn top(&self, intensity: Intensity, n: usize) -> &[PressureZone] {
        let tier = self.tier(intensity);
        &tier[..n.min(tier.len())]
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &PressureZone> {
        self.high.iter().chain(self.medium.iter()).chain(self.low.iter())
    }
}

// Shared trait + events for snapshot feeds

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::types::{OrderbookData, Venue, VenueSet};

/// One unvalidated level as a venue reported it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLevel {
    pub price: f64,
    pub quantity: f64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VenueQuotes {
    pub venue: Venue,
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
}

/// Everything a feed returns for one poll: per-venue levels for both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSnapshot {
    pub symbol: String,
    pub timestamp: u64,
    pub venues: Vec<VenueQuotes>,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported symbol `{0}`")]
    UnsupportedSymbol(String),
}

pub enum MarketEvent {
    // Fully normalized snapshot, tagged with the scheduler epoch that requested it
    Snapshot {
        epoch: u64,
        data: Arc<OrderbookData>,
        rejected: usize,
    },
    Connectivity {
        connected: bool,
    },
}

#[async_trait::async_trait]
pub trait SnapshotFeed: Send + Sync {
    async fn fetch_snapshot(&self, symbol: &str, venues: VenueSet) -> Result<RawSnapshot, FeedError>;
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub mod synthetic;

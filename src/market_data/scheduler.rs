// Refresh cadence + connectivity flake simulation.
//
// Both loops are plain tokio tasks that publish immutable values into the router's
// channel. Tests drive them with a paused tokio clock.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::types::VenueSet;
use crate::market_data::adapters::{MarketEvent, SnapshotFeed};
use crate::market_data::normaliser::Normaliser;

/// Time-range selector exposed to users; only its refresh cadence matters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl TimeRange {
    pub const ALL: [TimeRange; 6] = [
        TimeRange::OneMinute,
        TimeRange::FiveMinutes,
        TimeRange::FifteenMinutes,
        TimeRange::OneHour,
        TimeRange::FourHours,
        TimeRange::OneDay,
    ];

    pub fn key(self) -> &'static str {
        match self {
            TimeRange::OneMinute => "1m",
            TimeRange::FiveMinutes => "5m",
            TimeRange::FifteenMinutes => "15m",
            TimeRange::OneHour => "1h",
            TimeRange::FourHours => "4h",
            TimeRange::OneDay => "1d",
        }
    }

    pub fn cadence(self) -> Duration {
        cadence_for_key(self.key())
    }
}

/// Cadence for any selector key. Keys without a dedicated cadence poll every 30s.
pub fn cadence_for_key(key: &str) -> Duration {
    match key {
        "1m" => Duration::from_millis(1_000),
        "5m" => Duration::from_millis(5_000),
        "15m" => Duration::from_millis(15_000),
        _ => Duration::from_millis(30_000),
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown time range `{0}` (expected one of 1m, 5m, 15m, 1h, 4h, 1d)")]
pub struct UnknownTimeRange(pub String);

impl FromStr for TimeRange {
    type Err = UnknownTimeRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|t| t.key() == s.trim())
            .ok_or_else(|| UnknownTimeRange(s.to_string()))
    }
}

/// Parameters a refresh loop is bound to. Changing any of them means a restart.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedParams {
    pub symbol: String,
    pub venues: VenueSet,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlakeConfig {
    pub interval: Duration,
    pub probability: f64,
    pub recovery: Duration,
}

impl Default for FlakeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            probability: 0.05,
            recovery: Duration::from_secs(2),
        }
    }
}

pub struct RefreshScheduler {
    feed: Arc<dyn SnapshotFeed>,
    normaliser: Normaliser,
    tx: mpsc::Sender<MarketEvent>,
    epoch: u64,
    refresh: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn new(feed: Arc<dyn SnapshotFeed>, normaliser: Normaliser, tx: mpsc::Sender<MarketEvent>) -> Self {
        Self { feed, normaliser, tx, epoch: 0, refresh: None }
    }

    /// Epoch of the currently running loop; snapshots tagged with anything else are stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_running(&self) -> bool {
        self.refresh.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Tear down any running loop and start a fresh one bound to `params`.
    pub fn start(&mut self, params: FeedParams) -> u64 {
        self.stop();
        self.epoch += 1;
        info!(
            epoch = self.epoch,
            symbol = %params.symbol,
            venues = ?params.venues,
            time_range = %params.time_range,
            "starting refresh loop"
        );
        self.refresh = Some(tokio::spawn(refresh_loop(
            Arc::clone(&self.feed),
            self.normaliser,
            params,
            self.epoch,
            self.tx.clone(),
        )));
        self.epoch
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.refresh.take() {
            handle.abort();
            debug!(epoch = self.epoch, "refresh loop aborted");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn refresh_loop(
    feed: Arc<dyn SnapshotFeed>,
    normaliser: Normaliser,
    params: FeedParams,
    epoch: u64,
    tx: mpsc::Sender<MarketEvent>,
) {
    // first tick fires immediately, giving the initial snapshot
    let mut ticker = interval(params.time_range.cadence());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match feed.fetch_snapshot(&params.symbol, params.venues).await {
            Ok(raw) => {
                let ingested = normaliser.ingest(&raw);
                let event = MarketEvent::Snapshot {
                    epoch,
                    data: Arc::new(ingested.snapshot),
                    rejected: ingested.rejected,
                };
                if tx.send(event).await.is_err() {
                    debug!(epoch, "router gone, refresh loop exiting");
                    break;
                }
            }
            Err(e) => {
                warn!(epoch, symbol = %params.symbol, error = %e, "snapshot fetch failed, skipping tick");
            }
        }
    }
}

/// Spawn the connectivity flake loop. Each tick has `probability` of reporting the
/// connection down; it is reported up again after `recovery`.
pub fn spawn_flake(config: FlakeConfig, rng: StdRng, tx: mpsc::Sender<MarketEvent>) -> JoinHandle<()> {
    tokio::spawn(flake_loop(config, rng, tx))
}

async fn flake_loop(config: FlakeConfig, mut rng: StdRng, tx: mpsc::Sender<MarketEvent>) {
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !rng.gen_bool(config.probability) {
            continue;
        }

        warn!(recovery_ms = config.recovery.as_millis() as u64, "feed connection dropped");
        if tx.send(MarketEvent::Connectivity { connected: false }).await.is_err() {
            break;
        }
        tokio::time::sleep(config.recovery).await;
        info!("feed connection restored");
        if tx.send(MarketEvent::Connectivity { connected: true }).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Venue;
    use crate::market_data::adapters::synthetic::{SyntheticFeed, SyntheticParams};
    use crate::market_data::adapters::{FeedError, RawSnapshot};
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cadence_table() {
        assert_eq!(TimeRange::OneMinute.cadence(), Duration::from_millis(1_000));
        assert_eq!(TimeRange::FiveMinutes.cadence(), Duration::from_millis(5_000));
        assert_eq!(TimeRange::FifteenMinutes.cadence(), Duration::from_millis(15_000));
        assert_eq!(TimeRange::OneHour.cadence(), Duration::from_millis(30_000));
        assert_eq!(TimeRange::OneDay.cadence(), Duration::from_millis(30_000));
        assert_eq!(cadence_for_key("3w"), Duration::from_millis(30_000));
    }

    #[test]
    fn time_range_parses_keys() {
        assert_eq!("15m".parse::<TimeRange>(), Ok(TimeRange::FifteenMinutes));
        assert_eq!("4h".parse::<TimeRange>(), Ok(TimeRange::FourHours));
        assert!("2m".parse::<TimeRange>().is_err());
    }

    fn params(time_range: TimeRange) -> FeedParams {
        FeedParams { symbol: "BTC-USD".into(), venues: VenueSet::all(), time_range }
    }

    fn synthetic() -> Arc<dyn SnapshotFeed> {
        Arc::new(SyntheticFeed::seeded(SyntheticParams::default(), 11))
    }

    fn epoch_of(event: MarketEvent) -> Option<u64> {
        match event {
            MarketEvent::Snapshot { epoch, .. } => Some(epoch),
            MarketEvent::Connectivity { .. } => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_on_cadence() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut scheduler = RefreshScheduler::new(synthetic(), Normaliser::default(), tx);
        let epoch = scheduler.start(params(TimeRange::FiveMinutes));

        let first = rx.recv().await.unwrap();
        assert_eq!(epoch_of(first), Some(epoch));
        let started = Instant::now();

        let second = rx.recv().await.unwrap();
        assert_eq!(epoch_of(second), Some(epoch));
        assert!(started.elapsed() >= Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_bumps_epoch_and_stops_old_loop() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut scheduler = RefreshScheduler::new(synthetic(), Normaliser::default(), tx);
        let old = scheduler.start(params(TimeRange::OneMinute));
        rx.recv().await.unwrap();

        let mut switched = params(TimeRange::OneMinute);
        switched.venues = [Venue::Okx].into_iter().collect();
        let new = scheduler.start(switched);
        assert_eq!(new, old + 1);

        for _ in 0..3 {
            match rx.recv().await.unwrap() {
                MarketEvent::Snapshot { epoch, data, .. } => {
                    assert_eq!(epoch, new);
                    assert!(data.bids.iter().all(|l| l.venue == Venue::Okx));
                }
                MarketEvent::Connectivity { .. } => unreachable!(),
            }
        }
    }

    struct FailingFeed(AtomicUsize);

    #[async_trait::async_trait]
    impl SnapshotFeed for FailingFeed {
        async fn fetch_snapshot(&self, symbol: &str, _venues: VenueSet) -> Result<RawSnapshot, FeedError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(FeedError::Unavailable(format!("{symbol} down")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_skips_tick_and_keeps_polling() {
        let (tx, mut rx) = mpsc::channel(16);
        let feed = Arc::new(FailingFeed(AtomicUsize::new(0)));
        let mut scheduler = RefreshScheduler::new(feed.clone(), Normaliser::default(), tx);
        scheduler.start(params(TimeRange::OneMinute));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(feed.0.load(Ordering::SeqCst), 4);
        assert!(rx.try_recv().is_err());
        assert!(scheduler.is_running());

        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn certain_flake_goes_down_then_recovers() {
        let (tx, mut rx) = mpsc::channel(16);
        let config = FlakeConfig { probability: 1.0, ..FlakeConfig::default() };
        let start = Instant::now();
        let handle = spawn_flake(config, StdRng::seed_from_u64(3), tx);

        match rx.recv().await.unwrap() {
            MarketEvent::Connectivity { connected } => assert!(!connected),
            MarketEvent::Snapshot { .. } => unreachable!(),
        }
        assert!(start.elapsed() >= Duration::from_secs(10));

        match rx.recv().await.unwrap() {
            MarketEvent::Connectivity { connected } => assert!(connected),
            MarketEvent::Snapshot { .. } => unreachable!(),
        }
        assert!(start.elapsed() >= Duration::from_secs(12));
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_probability_never_flakes() {
        let (tx, mut rx) = mpsc::channel(16);
        let config = FlakeConfig { probability: 0.0, ..FlakeConfig::default() };
        let handle = spawn_flake(config, StdRng::seed_from_u64(3), tx);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
        handle.abort();
    }
}

// Router orchestrates scheduler + pipeline
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::engine::classifier::PressureClassifier;
use crate::engine::filter::{FilterParams, PriceRange};
use crate::engine::pipeline::{DepthView, Pipeline};
use crate::engine::types::{Venue, VenueSet};
use crate::market_data::adapters::{MarketEvent, SnapshotFeed};
use crate::market_data::normaliser::Normaliser;
use crate::market_data::scheduler::{spawn_flake, FeedParams, FlakeConfig, RefreshScheduler, TimeRange};
use crate::telemetry::LatencyRecorder;

/// User-driven parameter changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    SetSymbol(String),
    SetVenues(VenueSet),
    ToggleVenue(Venue),
    SetTimeRange(TimeRange),
    SetPriceRange(PriceRange),
    SetMinQuantity(f64),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub feed: FeedParams,
    pub filter: FilterParams,
    pub normaliser: Normaliser,
    pub classifier: PressureClassifier,
    pub flake: FlakeConfig,
    pub channel_capacity: usize,
}

/// Counters reported when the router stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub snapshots_applied: u64,
    pub stale_dropped: u64,
    pub rejected_levels: u64,
    pub restarts: u64,
    pub views_published: u64,
}

pub struct RouterHandle {
    pub controls: mpsc::Sender<Control>,
    pub views: watch::Receiver<Option<Arc<DepthView>>>,
}

pub struct Router {
    params: FeedParams,
    pipeline: Pipeline,
    scheduler: RefreshScheduler,
    flake: FlakeConfig,
    flake_rng: StdRng,
    events_tx: mpsc::Sender<MarketEvent>,
    events: mpsc::Receiver<MarketEvent>,
    controls: mpsc::Receiver<Control>,
    views: watch::Sender<Option<Arc<DepthView>>>,
    latency: LatencyRecorder,
    summary: RunSummary,
}

impl Router {
    pub fn new(feed: Arc<dyn SnapshotFeed>, config: RouterConfig, flake_rng: StdRng) -> (Self, RouterHandle) {
        let (events_tx, events) = mpsc::channel(config.channel_capacity);
        let (controls_tx, controls) = mpsc::channel(config.channel_capacity);
        let (views, views_rx) = watch::channel(None);

        let scheduler = RefreshScheduler::new(feed, config.normaliser, events_tx.clone());
        let pipeline = Pipeline::new(config.classifier, config.filter, config.feed.venues);

        let router = Self {
            params: config.feed,
            pipeline,
            scheduler,
            flake: config.flake,
            flake_rng,
            events_tx,
            events,
            controls,
            views,
            latency: LatencyRecorder::new(),
            summary: RunSummary::default(),
        };
        (router, RouterHandle { controls: controls_tx, views: views_rx })
    }

    /// Drive the pipeline until `Control::Shutdown` or every control sender is dropped.
    pub async fn run(mut self) -> RunSummary {
        let flake_task: JoinHandle<()> =
            spawn_flake(self.flake, self.flake_rng.clone(), self.events_tx.clone());
        self.restart_feed();

        loop {
            tokio::select! {
                Some(event) = self.events.recv() => self.on_event(event),
                control = self.controls.recv() => match control {
                    Some(Control::Shutdown) | None => break,
                    Some(control) => self.on_control(control),
                },
            }
        }

        self.scheduler.stop();
        flake_task.abort();
        self.latency.log_summary("view recompute");
        info!(summary = ?self.summary, "router stopped");
        self.summary
    }

    fn restart_feed(&mut self) {
        self.scheduler.start(self.params.clone());
        self.summary.restarts += 1;
        self.pipeline.set_connected(true);
        metrics::gauge!("depthx_connected").set(1.0);
    }

    fn on_event(&mut self, event: MarketEvent) {
        match event {
            MarketEvent::Snapshot { epoch, data, rejected } => {
                if epoch != self.scheduler.epoch() {
                    self.summary.stale_dropped += 1;
                    debug!(epoch, current = self.scheduler.epoch(), "dropping stale snapshot");
                    return;
                }
                self.summary.snapshots_applied += 1;
                self.summary.rejected_levels += rejected as u64;
                metrics::counter!("depthx_snapshots_total").increment(1);
                self.pipeline.set_snapshot(data);
            }
            MarketEvent::Connectivity { connected } => {
                metrics::gauge!("depthx_connected").set(if connected { 1.0 } else { 0.0 });
                self.pipeline.set_connected(connected);
            }
        }
        self.publish();
    }

    #[instrument(level = "debug", skip(self))]
    fn on_control(&mut self, control: Control) {
        match control {
            Control::SetSymbol(symbol) => {
                if symbol != self.params.symbol {
                    self.params.symbol = symbol;
                    self.restart_feed();
                }
            }
            Control::SetVenues(venues) => self.apply_venues(venues),
            Control::ToggleVenue(venue) => {
                let mut venues = self.params.venues;
                venues.toggle(venue);
                self.apply_venues(venues);
            }
            Control::SetTimeRange(time_range) => {
                if time_range != self.params.time_range {
                    self.params.time_range = time_range;
                    self.restart_feed();
                }
            }
            Control::SetPriceRange(price_range) => {
                if price_range.lo.is_nan() || price_range.hi.is_nan() || price_range.lo > price_range.hi {
                    warn!(?price_range, "ignoring empty price range");
                    return;
                }
                let filter = self.pipeline.filter_params();
                self.pipeline.set_filter(FilterParams { price_range, ..filter });
            }
            Control::SetMinQuantity(min_quantity) => {
                if !min_quantity.is_finite() || min_quantity < 0.0 {
                    warn!(min_quantity, "ignoring invalid minimum quantity");
                    return;
                }
                let filter = self.pipeline.filter_params();
                self.pipeline.set_filter(FilterParams { min_quantity, ..filter });
            }
            Control::Shutdown => {}
        }
        self.publish();
    }

    fn apply_venues(&mut self, venues: VenueSet) {
        if venues == self.params.venues {
            return;
        }
        self.params.venues = venues;
        self.pipeline.set_venues(venues);
        self.restart_feed();
    }

    fn publish(&mut self) {
        let started = Instant::now();
        let Some(view) = self.pipeline.view() else {
            return;
        };
        self.latency.record(started.elapsed());

        metrics::gauge!("depthx_zones_high").set(view.stats.high_zones as f64);
        metrics::gauge!("depthx_zones_medium").set(view.stats.medium_zones as f64);
        metrics::gauge!("depthx_zones_low").set(view.stats.low_zones as f64);

        self.summary.views_published += 1;
        self.views.send_replace(Some(Arc::new(view)));
    }
}

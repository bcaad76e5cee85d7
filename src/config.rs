use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::engine::classifier::PressureClassifier;
use crate::engine::filter::{FilterParams, PriceRange};
use crate::engine::types::{Venue, VenueSet};
use crate::market_data::adapters::synthetic::SyntheticParams;
use crate::market_data::normaliser::Normaliser;
use crate::market_data::router::RouterConfig;
use crate::market_data::scheduler::{FeedParams, FlakeConfig, TimeRange};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid { field, reason: reason.into() }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    pub symbol: String,
    pub venues: Vec<Venue>,
    pub time_range: TimeRange,
    pub base_price: f64,
    pub spread: f64,
    pub levels_per_venue: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    pub max_depth: usize,
    pub bucket_width: f64,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterSettings {
    pub price_min: f64,
    pub price_max: f64,
    pub min_quantity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlakeSettings {
    pub interval_ms: u64,
    pub probability: f64,
    pub recovery_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub feed: FeedSettings,
    pub engine: EngineSettings,
    pub filter: FilterSettings,
    pub flake: FlakeSettings,
    pub logging: LoggingSettings,
    pub metrics: MetricsSettings,
}

impl Settings {
    /// Defaults, then `depthx.toml` (or `path`), then `DEPTHX__SECTION__KEY` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            .set_default("feed.symbol", "BTC-USD")?
            .set_default("feed.venues", vec!["binance", "okx", "bybit", "deribit"])?
            .set_default("feed.time_range", "1m")?
            .set_default("feed.base_price", 65_000.0)?
            .set_default("feed.spread", 50.0)?
            .set_default("feed.levels_per_venue", 25i64)?
            .set_default("engine.max_depth", 50i64)?
            .set_default("engine.bucket_width", 100.0)?
            .set_default("engine.channel_capacity", 256i64)?
            .set_default("filter.price_min", 0.0)?
            .set_default("filter.price_max", 100_000.0)?
            .set_default("filter.min_quantity", 0.0)?
            .set_default("flake.interval_ms", 10_000i64)?
            .set_default("flake.probability", 0.05)?
            .set_default("flake.recovery_ms", 2_000i64)?
            .set_default("logging.level", "info")?
            .set_default("metrics.port", 9000i64)?;

        builder = match path {
            Some(p) => builder.add_source(File::from(p).required(true)),
            None => builder.add_source(File::with_name("depthx").required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("DEPTHX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("feed.venues"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.feed.symbol.trim().is_empty() {
            return Err(invalid("feed.symbol", "must not be empty"));
        }
        if !(self.feed.base_price.is_finite() && self.feed.base_price > 0.0) {
            return Err(invalid("feed.base_price", "must be positive"));
        }
        if !(self.feed.spread.is_finite() && self.feed.spread >= 0.0) {
            return Err(invalid("feed.spread", "must be non-negative"));
        }
        if self.engine.max_depth == 0 {
            return Err(invalid("engine.max_depth", "must be at least 1"));
        }
        if !(self.engine.bucket_width.is_finite() && self.engine.bucket_width > 0.0) {
            return Err(invalid("engine.bucket_width", "must be positive"));
        }
        if self.engine.channel_capacity == 0 {
            return Err(invalid("engine.channel_capacity", "must be at least 1"));
        }
        let f = &self.filter;
        if f.price_min.is_nan() || f.price_max.is_nan() || f.price_min > f.price_max {
            return Err(invalid(
                "filter.price_min",
                format!("range [{}, {}] is empty", f.price_min, f.price_max),
            ));
        }
        if !(f.min_quantity.is_finite() && f.min_quantity >= 0.0) {
            return Err(invalid("filter.min_quantity", "must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&self.flake.probability) {
            return Err(invalid("flake.probability", "must be within [0, 1]"));
        }
        if self.flake.interval_ms == 0 {
            return Err(invalid("flake.interval_ms", "must be positive"));
        }
        Ok(())
    }

    pub fn venue_set(&self) -> VenueSet {
        self.feed.venues.iter().copied().collect()
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            feed: FeedParams {
                symbol: self.feed.symbol.clone(),
                venues: self.venue_set(),
                time_range: self.feed.time_range,
            },
            filter: FilterParams::new(
                PriceRange::new(self.filter.price_min, self.filter.price_max),
                self.filter.min_quantity,
            ),
            normaliser: Normaliser::new(self.engine.max_depth),
            classifier: PressureClassifier::new(self.engine.bucket_width),
            flake: FlakeConfig {
                interval: Duration::from_millis(self.flake.interval_ms),
                probability: self.flake.probability,
                recovery: Duration::from_millis(self.flake.recovery_ms),
            },
            channel_capacity: self.engine.channel_capacity,
        }
    }

    pub fn synthetic_params(&self) -> SyntheticParams {
        SyntheticParams {
            base_price: self.feed.base_price,
            spread: self.feed.spread,
            levels_per_venue: self.feed.levels_per_venue,
        }
    }
}

/// Command-line overrides. Anything left unset keeps the file/env value.
#[derive(Debug, Parser)]
#[command(name = "depthx", about = "Multi-venue order book aggregation and pressure zones")]
pub struct CliArgs {
    /// Settings file (defaults to ./depthx.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub symbol: Option<String>,
    /// Comma separated, e.g. `binance,okx`
    #[arg(long, value_delimiter = ',')]
    pub venues: Option<Vec<Venue>>,
    #[arg(long)]
    pub time_range: Option<TimeRange>,
    #[arg(long)]
    pub price_min: Option<f64>,
    #[arg(long)]
    pub price_max: Option<f64>,
    #[arg(long)]
    pub min_quantity: Option<f64>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Stop after this many published views (runs until Ctrl-C otherwise)
    #[arg(long)]
    pub ticks: Option<u64>,
    /// Print each view as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

impl CliArgs {
    pub fn apply(&self, settings: &mut Settings) -> Result<(), SettingsError> {
        if let Some(symbol) = &self.symbol {
            settings.feed.symbol = symbol.clone();
        }
        if let Some(venues) = &self.venues {
            settings.feed.venues = venues.clone();
        }
        if let Some(time_range) = self.time_range {
            settings.feed.time_range = time_range;
        }
        if let Some(lo) = self.price_min {
            settings.filter.price_min = lo;
        }
        if let Some(hi) = self.price_max {
            settings.filter.price_max = hi;
        }
        if let Some(q) = self.min_quantity {
            settings.filter.min_quantity = q;
        }
        if let Some(seed) = self.seed {
            settings.feed.seed = Some(seed);
        }
        settings.validate()
    }
}

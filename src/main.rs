use std::sync::Arc;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use depthx_rs::config::{CliArgs, Settings};
use depthx_rs::engine::pipeline::DepthView;
use depthx_rs::engine::types::{Intensity, Venue};
use depthx_rs::market_data::adapters::synthetic::SyntheticFeed;
use depthx_rs::market_data::router::{Control, Router};
use depthx_rs::telemetry;

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}", v))
}

// Helper function to print the statistics panel
fn print_view_summary(view: &DepthView) {
    let stats = &view.stats;
    let venues: Vec<&str> = view.venues.iter().map(Venue::display_name).collect();

    println!("\n=== {} [{}] ===", view.display.symbol, venues.join(", "));
    println!("Connection: {}", if view.connected { "Connected" } else { "Disconnected" });
    println!("Current price: {}", fmt_opt(stats.current_price));
    println!("Spread: {}", fmt_opt(stats.spread));
    println!("Best bid: {} | Best ask: {}", fmt_opt(stats.best_bid), fmt_opt(stats.best_ask));
    println!(
        "Shown levels: {} bids ({:.4}) / {} asks ({:.4})",
        view.display.bids.len(),
        stats.total_bid_volume,
        view.display.asks.len(),
        stats.total_ask_volume
    );
    println!(
        "Pressure zones: high {}, medium {}, low {}",
        stats.high_zones, stats.medium_zones, stats.low_zones
    );
    for zone in view.zones.top(Intensity::High, 3) {
        println!(
            "  HIGH {:?} @ {:.0}: {:.4} across {} venues",
            zone.side,
            zone.price_level,
            zone.total_volume,
            zone.venues.len()
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let args = CliArgs::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings)?;

    telemetry::init_tracing(&settings.logging.level);
    telemetry::init_metrics(settings.metrics.port)?;

    let (feed, flake_rng) = match settings.feed.seed {
        Some(seed) => (
            SyntheticFeed::seeded(settings.synthetic_params(), seed),
            StdRng::seed_from_u64(seed.wrapping_add(1)),
        ),
        None => (SyntheticFeed::new(settings.synthetic_params()), StdRng::from_entropy()),
    };

    info!(
        symbol = %settings.feed.symbol,
        venues = ?settings.venue_set(),
        time_range = %settings.feed.time_range,
        "starting depthx"
    );

    let (router, mut handle) = Router::new(Arc::new(feed), settings.router_config(), flake_rng);
    let router_task = tokio::spawn(router.run());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut published = 0u64;

    loop {
        tokio::select! {
            changed = handle.views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = handle.views.borrow_and_update().clone();
                let Some(view) = view else { continue };

                if args.json {
                    println!("{}", serde_json::to_string(&*view)?);
                } else {
                    print_view_summary(&view);
                }

                published += 1;
                if args.ticks.is_some_and(|n| published >= n) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("ctrl-c received, shutting down");
                break;
            }
        }
    }

    // router may already be gone if the view channel closed
    let _ = handle.controls.send(Control::Shutdown).await;
    let summary = router_task.await?;
    info!(
        snapshots = summary.snapshots_applied,
        stale = summary.stale_dropped,
        rejected = summary.rejected_levels,
        views = summary.views_published,
        "done"
    );

    Ok(())
}

//! Multi-venue order book aggregation with pressure-zone classification.
//!
//! ```text
//!  SnapshotFeed ──► RefreshScheduler ──┐
//!                                      ├─► Router ──► Pipeline ──► DepthView (watch)
//!  flake loop ─────────────────────────┘     ▲
//!                                 Control ───┘
//! ```
//!
//! `market_data` owns ingestion and scheduling; `engine` holds the pure transforms
//! (filter, classifier) and the memoized pipeline that combines them.

pub mod config;
pub mod engine;
pub mod market_data;
pub mod telemetry;

// Pure transforms over normalized snapshots
pub mod types;      // venues, levels, snapshots, zones
pub mod filter;     // price-range / min-quantity display filter
pub mod classifier; // bucketing + intensity tiers
pub mod pipeline;   // memoized filter + classify, market stats

// Market data module entrypoint
pub mod adapters;   // feed trait, raw snapshot types, synthetic feed
pub mod normaliser; // validates raw levels, merges venues into one ladder
pub mod scheduler;  // refresh cadence + connectivity flake loops
pub mod router;     // orchestrates scheduler, pipeline and controls

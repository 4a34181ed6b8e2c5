//! Eviction policy
//!
//! Pure functions deciding when a set is over capacity and how far back the
//! remove-by-age cutoff must reach.

mod proptest;
pub mod threshold;
pub mod watermark;

pub use threshold::{select_cutoff, NO_EVICTION};
pub use watermark::{
    compute_limits, WatermarkConfig, WatermarkLimits, DEFAULT_GLOBAL_HARD_TARGET,
    DEFAULT_GLOBAL_SOFT_TARGET, DEFAULT_REPLICA_COUNT,
};

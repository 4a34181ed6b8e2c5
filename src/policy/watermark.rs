//! Watermark Policy
//!
//! A set's entries are spread over `live_nodes` nodes with `replica_count`
//! copies each, so one node holds `target * replica_count / live_nodes` of a
//! global target. Limits are recomputed every pass: a limit computed against
//! a larger node count would miss pressure after a node loss.

use serde::Serialize;

use crate::error::{Error, Result};

/// Default global entry count eviction brings a set back under
pub const DEFAULT_GLOBAL_SOFT_TARGET: u64 = 20_000_000;

/// Default global entry count above which eviction starts
pub const DEFAULT_GLOBAL_HARD_TARGET: u64 = 25_000_000;

/// Default replication factor of the namespace
pub const DEFAULT_REPLICA_COUNT: u32 = 2;

// =============================================================================
// Configuration
// =============================================================================

/// Cluster-wide capacity targets for the managed set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkConfig {
    /// Replication factor of the namespace
    pub replica_count: u32,

    /// Global entry count to fall back under once eviction triggers
    pub global_soft_target: u64,

    /// Global entry count that triggers eviction
    pub global_hard_target: u64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            replica_count: DEFAULT_REPLICA_COUNT,
            global_soft_target: DEFAULT_GLOBAL_SOFT_TARGET,
            global_hard_target: DEFAULT_GLOBAL_HARD_TARGET,
        }
    }
}

impl WatermarkConfig {
    /// Check bounds once at startup
    pub fn validate(&self) -> Result<()> {
        if self.replica_count == 0 {
            return Err(Error::Config("replica count must be at least 1".into()));
        }
        if self.global_soft_target == 0 {
            return Err(Error::Config("global soft target must be positive".into()));
        }
        if self.global_soft_target > self.global_hard_target {
            return Err(Error::Config(format!(
                "global soft target {} exceeds hard target {}",
                self.global_soft_target, self.global_hard_target
            )));
        }
        Ok(())
    }

    /// Per-node limits for the current live node count
    pub fn limits_for(&self, live_nodes: usize) -> Result<WatermarkLimits> {
        compute_limits(
            self.replica_count,
            live_nodes,
            self.global_soft_target,
            self.global_hard_target,
        )
    }
}

// =============================================================================
// Limits
// =============================================================================

/// Per-node watermarks for one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WatermarkLimits {
    /// Occupancy eviction should fall back under
    pub soft_limit: u64,
    /// Occupancy above which eviction triggers
    pub hard_limit: u64,
}

impl WatermarkLimits {
    /// Whether `objects` breaches the hard limit
    pub fn exceeds_hard(&self, objects: u64) -> bool {
        objects > self.hard_limit
    }
}

fn per_node_share(target: u64, replica_count: u32, live_nodes: usize) -> u64 {
    let share = u128::from(target) * u128::from(replica_count) / live_nodes as u128;
    u64::try_from(share).unwrap_or(u64::MAX).max(1)
}

/// Compute per-node soft and hard limits.
///
/// Zero live nodes or a zero replica count is a configuration error; the
/// caller skips the pass.
pub fn compute_limits(
    replica_count: u32,
    live_nodes: usize,
    global_soft_target: u64,
    global_hard_target: u64,
) -> Result<WatermarkLimits> {
    if live_nodes == 0 {
        return Err(Error::Config(
            "cannot compute watermarks with zero live nodes".into(),
        ));
    }
    if replica_count == 0 {
        return Err(Error::Config(
            "cannot compute watermarks with zero replicas".into(),
        ));
    }

    let soft = per_node_share(global_soft_target, replica_count, live_nodes);
    let hard = per_node_share(global_hard_target, replica_count, live_nodes);

    Ok(WatermarkLimits {
        soft_limit: soft.min(hard),
        hard_limit: hard,
    })
}

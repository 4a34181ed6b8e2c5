//! Controller module
//!
//! The periodic scan-and-evict loop, the per-pass cluster scanner and the
//! loop's Prometheus collectors.

mod lru;
mod scanner;
mod telemetry;

pub use lru::{ControllerConfig, LoopState, LruController, PassSummary, DEFAULT_INTERVAL};
pub use scanner::{
    ClusterScanner, NodeOutcome, NodeReport, OverLimitSet, ScanOutcome, ScannerConfig,
};
pub use telemetry::ControllerMetrics;

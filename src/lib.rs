//! aerolru - Watermark-driven TTL eviction for Aerospike sets
//!
//! A periodic controller that keeps a capacity-bounded set within size
//! bounds. When a node's share of the set crosses a hard limit, it picks a
//! TTL cutoff from the set's age histogram and removes everything older,
//! cluster-wide, until the set falls back under a soft limit.
//!
//! # Architecture
//!
//! The controller follows a three-component "Eyes, Brain, Hands" pattern:
//!
//! ```text
//! Metrics Watcher (Eyes) → LRU Controller (Brain) → Eviction Dispatcher (Hands)
//! ```
//!
//! Limits scale with the cluster: each node is allowed
//! `target × replica_count / live_nodes` objects, recomputed every pass.
//!
//! # Modules
//!
//! - [`adapters`] - Aerospike wire adapter and in-memory test doubles
//! - [`controller`] - Control loop, cluster scanner and metrics
//! - [`domain`] - Ports and domain events
//! - [`error`] - Error types
//! - [`evictor`] - Eviction plan and dispatcher
//! - [`metrics`] - Info reply parsing and per-node queries
//! - [`policy`] - Watermark limits and cutoff selection

pub mod adapters;
pub mod controller;
pub mod domain;
pub mod error;
pub mod evictor;
pub mod metrics;
pub mod policy;

// Re-export commonly used types
pub use controller::{ControllerConfig, LruController, PassSummary};
pub use error::{Error, Result};
pub use evictor::{EvictionDecision, EvictionPlan};
pub use metrics::{AgeHistogram, MetricsWatcher, SetOccupancy};
pub use policy::{compute_limits, select_cutoff, WatermarkLimits};

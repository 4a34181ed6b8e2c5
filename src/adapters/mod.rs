//! Infrastructure Adapters
//!
//! Implementations of the domain ports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  ClusterTopology │ NodeConnector │ EvictionExecutor        │ │
//! │  │  EventPublisher                                             │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ AerospikeCluster │ InMemoryCluster                          │ │
//! │  │ LoggingEventPublisher │ InMemoryEventCollector              │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use aerolru::adapters::{AerospikeCluster, AerospikeConfig};
//! use aerolru::domain::ClusterTopology;
//!
//! let cluster = AerospikeCluster::new(AerospikeConfig::default());
//! let nodes = cluster.live_nodes().await?;
//! ```

mod aerospike;
mod event_publisher;
pub mod info_protocol;
mod memory;

pub use aerospike::{AerospikeCluster, AerospikeConfig, UDF_FILENAME, UDF_SOURCE};
pub use event_publisher::{InMemoryEventCollector, LoggingEventPublisher};
pub use memory::{DispatchCall, InMemoryCluster, ScriptedNode};

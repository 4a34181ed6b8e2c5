//! Domain Layer
//!
//! - **Ports** (`ports.rs`) - Trait abstractions for the cluster and event sinks
//! - **Events** (`events.rs`) - Domain events for audit and tests
//!
//! # Usage
//!
//! ```ignore
//! use aerolru::domain::ports::{ClusterTopology, NodeConnector};
//!
//! async fn count_nodes<T: ClusterTopology>(topology: &T) -> Result<usize> {
//!     Ok(topology.live_nodes().await?.len())
//! }
//! ```

pub mod events;
pub mod ports;

pub use events::DomainEvent;
pub use ports::{
    ClusterTopology, EventPublisher, EvictionExecutor, InfoSession, Node, NodeConnector, NodeId,
};

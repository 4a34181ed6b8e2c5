//! Domain Ports (Port/Adapter Pattern)
//!
//! The controller only talks to the cluster through these traits. The
//! Aerospike adapter speaks the real wire protocol; the in-memory adapter
//! scripts replies for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │ ClusterTopology │ NodeConnector │ EvictionExecutor  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │        AerospikeCluster │ InMemoryCluster            │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::events::DomainEvent;
use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Cluster node identifier (value object).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A live cluster node as reported by the topology provider.
///
/// Nodes are rediscovered every pass and never cached across passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier
    pub id: NodeId,
    /// `host:port` the node answers on
    pub address: String,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

// =============================================================================
// Topology Port
// =============================================================================

/// Port returning the nodes currently part of the cluster.
#[async_trait]
pub trait ClusterTopology: Send + Sync {
    /// Fetch the current live node list. Must not serve a cached list.
    async fn live_nodes(&self) -> Result<Vec<Node>>;
}

// =============================================================================
// Introspection Ports
// =============================================================================

/// Port opening a short-lived introspection session to one node.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    /// Open a session. The session is dropped once the node's fetches are done.
    async fn connect(&self, node: &Node) -> Result<Box<dyn InfoSession>>;
}

/// One open request/response channel to a node.
#[async_trait]
pub trait InfoSession: Send {
    /// Send named queries and return the reply for each query key.
    ///
    /// Keys the node did not answer are absent from the map.
    async fn request_info(&mut self, keys: &[&str]) -> Result<HashMap<String, String>>;
}

// =============================================================================
// Eviction Port
// =============================================================================

/// Port for the server-side remove-by-age procedure.
///
/// Implementations issue the removal cluster-wide and must be safe to call
/// again with the same or a larger cutoff.
#[async_trait]
pub trait EvictionExecutor: Send + Sync {
    /// Remove every entry of `namespace.set_name` older than `cutoff_secs`.
    async fn remove_older_than(
        &self,
        namespace: &str,
        set_name: &str,
        cutoff_secs: u64,
    ) -> Result<()>;
}

// =============================================================================
// Event Publisher Port
// =============================================================================

/// Port for publishing domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single domain event.
    async fn publish(&self, event: DomainEvent) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display_and_conversion() {
        let id: NodeId = "BB9020011AC4202".into();
        assert_eq!(id.as_str(), "BB9020011AC4202");
        assert_eq!(id.to_string(), "BB9020011AC4202");
        assert_eq!(NodeId::new("a"), NodeId::from("a"));
    }

    #[test]
    fn test_node_display() {
        let node = Node::new("A1", "10.0.0.1:3000");
        assert_eq!(node.to_string(), "A1@10.0.0.1:3000");
    }

    #[test]
    fn test_node_serializes() {
        let node = Node::new("A1", "10.0.0.1:3000");
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"address\":\"10.0.0.1:3000\""));
        assert!(json.contains("\"id\":\"A1\""));
    }
}

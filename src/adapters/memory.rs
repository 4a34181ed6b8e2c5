//! In-Memory Cluster Adapter
//!
//! A scripted cluster implementing every cluster port. Nodes answer info
//! queries from a fixed reply table; dispatches are recorded instead of run.
//! State can be changed between passes to simulate membership churn.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::ports::{
    ClusterTopology, EvictionExecutor, InfoSession, Node, NodeConnector, NodeId,
};
use crate::error::{Error, Result};
use crate::metrics::{histogram_query, SETS_QUERY};

// =============================================================================
// Scripted Node
// =============================================================================

/// One scripted node and its canned info replies
#[derive(Debug, Clone)]
pub struct ScriptedNode {
    node: Node,
    replies: HashMap<String, String>,
    unreachable: bool,
    delay: Option<Duration>,
}

impl ScriptedNode {
    pub fn new(id: &str, address: &str) -> Self {
        Self {
            node: Node::new(id, address),
            replies: HashMap::new(),
            unreachable: false,
            delay: None,
        }
    }

    /// Canned reply for an arbitrary info key
    pub fn with_reply(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.replies.insert(key.into(), value.into());
        self
    }

    /// Canned `sets` reply
    pub fn with_sets(self, raw: impl Into<String>) -> Self {
        self.with_reply(SETS_QUERY, raw)
    }

    /// Canned TTL histogram reply for `namespace.set_name`
    pub fn with_histogram(self, namespace: &str, set_name: &str, raw: impl Into<String>) -> Self {
        self.with_reply(histogram_query(namespace, set_name), raw)
    }

    /// Refuse connections
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Delay every info reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

// =============================================================================
// Recorded Calls
// =============================================================================

/// A remove-by-age call seen by the in-memory executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchCall {
    pub namespace: String,
    pub set_name: String,
    pub cutoff_secs: u64,
}

#[derive(Debug, Default)]
struct ClusterState {
    nodes: Vec<ScriptedNode>,
    topology_error: Option<String>,
    failing_sets: HashSet<String>,
    dispatches: Vec<DispatchCall>,
    info_requests: Vec<(NodeId, String)>,
    topology_calls: usize,
}

// =============================================================================
// In-Memory Cluster
// =============================================================================

/// Scripted cluster for tests and dry runs without a server
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cluster with the given nodes
    pub fn with_nodes(nodes: impl IntoIterator<Item = ScriptedNode>) -> Self {
        let cluster = Self::new();
        cluster.state.lock().nodes.extend(nodes);
        cluster
    }

    pub fn add_node(&self, node: ScriptedNode) {
        self.state.lock().nodes.push(node);
    }

    /// Remove a node from the topology; returns whether it was present
    pub fn remove_node(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.nodes.len();
        state.nodes.retain(|n| n.node.id.as_str() != id);
        state.nodes.len() != before
    }

    /// Make topology queries fail with `reason`, or succeed again with `None`
    pub fn set_topology_failure(&self, reason: Option<&str>) {
        self.state.lock().topology_error = reason.map(str::to_string);
    }

    /// Make remove-by-age calls for `set_name` fail
    pub fn fail_dispatch_for(&self, set_name: &str) {
        self.state.lock().failing_sets.insert(set_name.to_string());
    }

    /// Remove-by-age calls received so far, including failed ones
    pub fn dispatches(&self) -> Vec<DispatchCall> {
        self.state.lock().dispatches.clone()
    }

    /// Every info key requested, with the node it was sent to
    pub fn info_requests(&self) -> Vec<(NodeId, String)> {
        self.state.lock().info_requests.clone()
    }

    /// Info keys starting with `histogram:`
    pub fn histogram_requests(&self) -> Vec<(NodeId, String)> {
        self.info_requests()
            .into_iter()
            .filter(|(_, key)| key.starts_with("histogram:"))
            .collect()
    }

    /// Number of topology lookups served
    pub fn topology_calls(&self) -> usize {
        self.state.lock().topology_calls
    }
}

#[async_trait]
impl ClusterTopology for InMemoryCluster {
    async fn live_nodes(&self) -> Result<Vec<Node>> {
        let mut state = self.state.lock();
        state.topology_calls += 1;
        if let Some(reason) = &state.topology_error {
            return Err(Error::connection("seed", reason));
        }
        Ok(state.nodes.iter().map(|n| n.node.clone()).collect())
    }
}

#[async_trait]
impl NodeConnector for InMemoryCluster {
    async fn connect(&self, node: &Node) -> Result<Box<dyn InfoSession>> {
        let scripted = self
            .state
            .lock()
            .nodes
            .iter()
            .find(|n| n.node.id == node.id)
            .cloned()
            .ok_or_else(|| Error::connection(node.address.as_str(), "node left the cluster"))?;

        if scripted.unreachable {
            return Err(Error::connection(node.address.as_str(), "connection refused"));
        }

        Ok(Box::new(InMemorySession {
            node: scripted,
            state: Arc::clone(&self.state),
        }))
    }
}

#[async_trait]
impl EvictionExecutor for InMemoryCluster {
    async fn remove_older_than(
        &self,
        namespace: &str,
        set_name: &str,
        cutoff_secs: u64,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.dispatches.push(DispatchCall {
            namespace: namespace.to_string(),
            set_name: set_name.to_string(),
            cutoff_secs,
        });

        if state.failing_sets.contains(set_name) {
            return Err(Error::Dispatch {
                set_name: set_name.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

struct InMemorySession {
    node: ScriptedNode,
    state: Arc<Mutex<ClusterState>>,
}

#[async_trait]
impl InfoSession for InMemorySession {
    async fn request_info(&mut self, keys: &[&str]) -> Result<HashMap<String, String>> {
        {
            let mut state = self.state.lock();
            for key in keys {
                state
                    .info_requests
                    .push((self.node.node.id.clone(), key.to_string()));
            }
        }

        if let Some(delay) = self.node.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(keys
            .iter()
            .filter_map(|key| {
                self.node
                    .replies
                    .get(*key)
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn lru_node(id: &str, objects: u64) -> ScriptedNode {
        ScriptedNode::new(id, &format!("{}:3000", id))
            .with_sets(format!("ns=persisted:set=lru:objects={}", objects))
    }

    #[test]
    fn test_topology_reflects_membership_changes() {
        let cluster = InMemoryCluster::with_nodes([lru_node("A", 1), lru_node("B", 2)]);
        let nodes = tokio_test::block_on(cluster.live_nodes()).unwrap();
        assert_eq!(nodes.len(), 2);

        assert!(cluster.remove_node("A"));
        assert!(!cluster.remove_node("A"));
        let nodes = tokio_test::block_on(cluster.live_nodes()).unwrap();
        assert_eq!(nodes, vec![Node::new("B", "B:3000")]);
        assert_eq!(cluster.topology_calls(), 2);
    }

    #[tokio::test]
    async fn test_topology_failure() {
        let cluster = InMemoryCluster::with_nodes([lru_node("A", 1)]);
        cluster.set_topology_failure(Some("seed down"));
        assert_matches!(cluster.live_nodes().await, Err(Error::Connection { .. }));

        cluster.set_topology_failure(None);
        assert_eq!(cluster.live_nodes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_session_answers_known_keys_and_records_requests() {
        let cluster = InMemoryCluster::with_nodes([lru_node("A", 42)]);
        let node = Node::new("A", "A:3000");

        let mut session = cluster.connect(&node).await.unwrap();
        let reply = session.request_info(&["sets", "unknown"]).await.unwrap();

        assert_eq!(reply.len(), 1);
        assert_eq!(reply["sets"], "ns=persisted:set=lru:objects=42");
        assert_eq!(cluster.info_requests().len(), 2);
        assert!(cluster.histogram_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_node_answers_after_delay() {
        let cluster =
            InMemoryCluster::with_nodes([lru_node("A", 7).with_delay(Duration::from_secs(30))]);
        let mut session = cluster.connect(&Node::new("A", "A:3000")).await.unwrap();

        let started = tokio::time::Instant::now();
        let reply = session.request_info(&["sets"]).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(reply["sets"], "ns=persisted:set=lru:objects=7");
    }

    #[tokio::test]
    async fn test_unreachable_node_refuses_connection() {
        let cluster = InMemoryCluster::with_nodes([lru_node("A", 1).unreachable()]);
        let result = cluster.connect(&Node::new("A", "A:3000")).await;
        assert_matches!(result.err(), Some(Error::Connection { .. }));
    }

    #[tokio::test]
    async fn test_dispatch_records_and_fails_on_request() {
        let cluster = InMemoryCluster::new();
        cluster.fail_dispatch_for("bad");

        cluster.remove_older_than("persisted", "lru", 7200).await.unwrap();
        let err = cluster
            .remove_older_than("persisted", "bad", 60)
            .await
            .unwrap_err();

        assert_matches!(err, Error::Dispatch { .. });
        assert_eq!(
            cluster.dispatches(),
            vec![
                DispatchCall {
                    namespace: "persisted".to_string(),
                    set_name: "lru".to_string(),
                    cutoff_secs: 7200,
                },
                DispatchCall {
                    namespace: "persisted".to_string(),
                    set_name: "bad".to_string(),
                    cutoff_secs: 60,
                },
            ]
        );
    }
}

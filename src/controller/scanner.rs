//! Cluster Scanner
//!
//! One pass over every live node. Each node gets its own session; sets over
//! the hard limit get a histogram fetch and a cutoff. Per-node plans are
//! folded into a single plan with the max cutoff per set.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::events::DomainEvent;
use crate::domain::ports::{EventPublisher, Node, NodeConnector};
use crate::error::{Error, Result};
use crate::evictor::{EvictionDecision, EvictionPlan};
use crate::metrics::{MetricsWatcher, SetOccupancy};
use crate::policy::{select_cutoff, WatermarkLimits};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the cluster scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Nodes scanned at the same time (1 = sequential)
    pub max_concurrent_scans: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scans: 1,
        }
    }
}

impl ScannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_scans == 0 {
            return Err(Error::Config(
                "max_concurrent_scans must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Reports
// =============================================================================

/// A set found over the hard limit on one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverLimitSet {
    pub set_name: String,
    pub objects: u64,
    pub cutoff_secs: u64,
}

/// What happened on one node
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Occupancy read; `over_limit` lists sets that needed a cutoff
    Scanned {
        occupancy: Vec<SetOccupancy>,
        over_limit: Vec<OverLimitSet>,
    },
    /// Node failed and contributed nothing this pass
    Skipped { reason: String },
}

/// Per-node scan result
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node: Node,
    pub outcome: NodeOutcome,
}

impl NodeReport {
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, NodeOutcome::Skipped { .. })
    }

    /// Plan contributed by this node
    pub fn plan(&self) -> EvictionPlan {
        match &self.outcome {
            NodeOutcome::Scanned { over_limit, .. } => over_limit
                .iter()
                .map(|s| EvictionDecision::new(s.set_name.clone(), s.cutoff_secs))
                .collect(),
            NodeOutcome::Skipped { .. } => EvictionPlan::new(),
        }
    }
}

/// Result of scanning every node
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    /// Merged plan, max cutoff per set
    pub plan: EvictionPlan,
    /// One report per node, in completion order
    pub reports: Vec<NodeReport>,
}

impl ScanOutcome {
    pub fn nodes_scanned(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_skipped()).count()
    }

    pub fn nodes_skipped(&self) -> usize {
        self.reports.iter().filter(|r| r.is_skipped()).count()
    }

    /// Number of (node, set) pairs over the hard limit
    pub fn sets_over_limit(&self) -> usize {
        self.reports
            .iter()
            .map(|r| match &r.outcome {
                NodeOutcome::Scanned { over_limit, .. } => over_limit.len(),
                NodeOutcome::Skipped { .. } => 0,
            })
            .sum()
    }
}

// =============================================================================
// Cluster Scanner
// =============================================================================

/// Scans nodes and builds the pass's eviction plan
pub struct ClusterScanner {
    config: ScannerConfig,
    watcher: MetricsWatcher,
    connector: Arc<dyn NodeConnector>,
    events: Arc<dyn EventPublisher>,
}

impl ClusterScanner {
    pub fn new(
        config: ScannerConfig,
        watcher: MetricsWatcher,
        connector: Arc<dyn NodeConnector>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            config,
            watcher,
            connector,
            events,
        }
    }

    /// Scan `nodes` against `limits`.
    ///
    /// Node failures are contained and reported as skipped. Returns
    /// `Error::Cancelled` if `cancel` fires before every node was scanned.
    #[instrument(skip_all, fields(pass_id = %pass_id, nodes = nodes.len()))]
    pub async fn scan_pass(
        &self,
        pass_id: Uuid,
        nodes: &[Node],
        limits: WatermarkLimits,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome> {
        let concurrency = self.config.max_concurrent_scans.max(1);

        // Boxed eagerly: the pass future must stay Send
        let scans: Vec<BoxFuture<'_, Option<NodeReport>>> = nodes
            .iter()
            .map(|node| {
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(self.scan_node_contained(pass_id, node, limits).await)
                }
                .boxed()
            })
            .collect();

        let reports: Vec<Option<NodeReport>> = stream::iter(scans)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        if reports.iter().any(Option::is_none) {
            info!("Scan cancelled before all nodes were visited");
            return Err(Error::Cancelled);
        }

        let reports: Vec<NodeReport> = reports.into_iter().flatten().collect();
        let plan = reports
            .iter()
            .map(NodeReport::plan)
            .fold(EvictionPlan::new(), EvictionPlan::merge);

        Ok(ScanOutcome { plan, reports })
    }

    async fn scan_node_contained(
        &self,
        pass_id: Uuid,
        node: &Node,
        limits: WatermarkLimits,
    ) -> NodeReport {
        let outcome = match self.scan_node(pass_id, node, limits).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(node = %node.address, error = %e, "Skipping node {} for this pass", node);
                self.publish(DomainEvent::node_skipped(pass_id, node, e.to_string()))
                    .await;
                NodeOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        };

        NodeReport {
            node: node.clone(),
            outcome,
        }
    }

    #[instrument(skip(self, limits), fields(node = %node.address))]
    async fn scan_node(
        &self,
        pass_id: Uuid,
        node: &Node,
        limits: WatermarkLimits,
    ) -> Result<NodeOutcome> {
        info!("Check node {}", node.address);

        let mut session = self.connector.connect(node).await?;
        let occupancy = self.watcher.fetch_occupancy(node, session.as_mut()).await?;

        let mut over_limit = Vec::new();
        for set in &occupancy {
            if !limits.exceeds_hard(set.objects) {
                debug!(
                    "Set {} on {} within limits: {}/{}",
                    set.set_name, node.address, set.objects, limits.hard_limit
                );
                continue;
            }

            info!(
                "Compute ttl to remove for {} set because reach max items: {}/{}",
                set.set_name, set.objects, limits.hard_limit
            );
            let histogram = self
                .watcher
                .fetch_histogram(node, session.as_mut(), &set.set_name)
                .await?;
            let cutoff_secs = select_cutoff(set.objects, limits.soft_limit, &histogram);

            self.publish(DomainEvent::set_over_limit(
                pass_id,
                node,
                set.set_name.as_str(),
                set.objects,
                limits.hard_limit,
                cutoff_secs,
            ))
            .await;

            over_limit.push(OverLimitSet {
                set_name: set.set_name.clone(),
                objects: set.objects,
                cutoff_secs,
            });
        }

        drop(session);
        Ok(NodeOutcome::Scanned {
            occupancy,
            over_limit,
        })
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.events.publish(event).await {
            warn!("Failed to publish event: {}", e);
        }
    }
}

impl std::fmt::Debug for ClusterScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterScanner")
            .field("config", &self.config)
            .field("watcher", &self.watcher)
            .finish()
    }
}

//! LRU Control Loop - "The Brain"
//!
//! Alternates between a scan-and-evict pass and a fixed sleep until the
//! cancellation token fires.
//!
//! ```text
//!            ┌──────────────┐   pass done (any outcome)  ┌──────────┐
//!   start ──▶│ ScanAndEvict │──────────────────────────▶│ Sleeping │
//!            └──────────────┘◀──────────────────────────└──────────┘
//!                                  interval elapsed          │
//!                                                            ▼ cancelled
//!                                                          exit
//! ```
//!
//! A pass never outlives its own failures: topology errors and zero live
//! nodes skip the pass, node errors skip the node, dispatch errors skip the
//! set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::scanner::{ClusterScanner, NodeReport, ScannerConfig};
use super::telemetry::ControllerMetrics;
use crate::domain::events::DomainEvent;
use crate::domain::ports::{
    ClusterTopology, EventPublisher, EvictionExecutor, NodeConnector,
};
use crate::error::{Error, Result};
use crate::evictor::{DispatchReport, DispatcherConfig, EvictionDispatcher, EvictionPlan};
use crate::metrics::{MetricsWatcher, WatcherConfig};
use crate::policy::{WatermarkConfig, WatermarkLimits};

/// Default pause between passes
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(20 * 60);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the control loop and its components
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Sleep between the end of one pass and the start of the next
    pub interval: Duration,

    /// Global targets and replica count
    pub watermark: WatermarkConfig,

    /// Info query settings
    pub watcher: WatcherConfig,

    /// Node fan-out
    pub scanner: ScannerConfig,

    /// Remove-by-age settings
    pub dispatcher: DispatcherConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            watermark: WatermarkConfig::default(),
            watcher: WatcherConfig::default(),
            scanner: ScannerConfig::default(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Check every component config. Failures are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::Config("interval must be positive".to_string()));
        }
        if self.watcher.namespace != self.dispatcher.namespace {
            return Err(Error::Config(format!(
                "watcher namespace '{}' differs from dispatcher namespace '{}'",
                self.watcher.namespace, self.dispatcher.namespace
            )));
        }
        self.watermark.validate()?;
        self.watcher.validate()?;
        self.scanner.validate()?;
        self.dispatcher.validate()
    }
}

// =============================================================================
// Loop State & Pass Summary
// =============================================================================

/// Control loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    ScanAndEvict,
    Sleeping,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::ScanAndEvict => write!(f, "ScanAndEvict"),
            LoopState::Sleeping => write!(f, "Sleeping"),
        }
    }
}

/// Outcome of one completed pass
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub nodes_total: usize,
    pub nodes_scanned: usize,
    pub nodes_skipped: usize,
    /// Node/set pairs over the hard limit
    pub sets_over_limit: usize,
    pub limits: WatermarkLimits,
    pub plan: EvictionPlan,
    pub dispatch: DispatchReport,
    pub nodes: Vec<NodeReport>,
    pub duration: Duration,
}

// =============================================================================
// Controller
// =============================================================================

/// Periodic scan-and-evict controller
pub struct LruController {
    config: ControllerConfig,
    topology: Arc<dyn ClusterTopology>,
    scanner: ClusterScanner,
    dispatcher: EvictionDispatcher,
    events: Arc<dyn EventPublisher>,
    metrics: Option<ControllerMetrics>,
}

impl LruController {
    /// Build a controller whose ports are all served by `cluster`.
    pub fn new<C>(config: ControllerConfig, cluster: Arc<C>, events: Arc<dyn EventPublisher>) -> Self
    where
        C: ClusterTopology + NodeConnector + EvictionExecutor + 'static,
    {
        let scanner = ClusterScanner::new(
            config.scanner.clone(),
            MetricsWatcher::new(config.watcher.clone()),
            cluster.clone(),
            events.clone(),
        );
        let dispatcher =
            EvictionDispatcher::new(config.dispatcher.clone(), cluster.clone(), events.clone());

        Self {
            config,
            topology: cluster,
            scanner,
            dispatcher,
            events,
            metrics: None,
        }
    }

    /// Record pass outcomes into `metrics`
    pub fn with_metrics(mut self, metrics: ControllerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run passes until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        info!(
            "Starting LRU controller (interval {:?}, dry-run {})",
            self.config.interval, self.config.dispatcher.dry_run
        );

        let mut state = LoopState::ScanAndEvict;
        loop {
            match state {
                LoopState::ScanAndEvict => {
                    let span = info_span!("pass", state = %state);
                    match self.run_pass(&cancel).instrument(span).await {
                        Ok(_) => {}
                        Err(Error::Cancelled) => break,
                        Err(e) => warn!("Pass ended without eviction: {}", e),
                    }
                    state = LoopState::Sleeping;
                }
                LoopState::Sleeping => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    info!(
                        "Sleep {:.1} min before next size check",
                        self.config.interval.as_secs_f64() / 60.0
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.interval) => {}
                    }
                    state = LoopState::ScanAndEvict;
                }
            }
        }

        info!("LRU controller stopped");
        Ok(())
    }

    /// Run a single scan-and-evict pass.
    ///
    /// Topology failures and an empty cluster skip the pass and are returned
    /// as errors. `Error::Cancelled` means the scan was interrupted and
    /// nothing was dispatched.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassSummary> {
        let pass_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let nodes = match self.topology.live_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                error!("Cannot list cluster nodes, skipping pass: {}", e);
                return Err(self.skip_pass(pass_id, e).await);
            }
        };

        let limits = match self.config.watermark.limits_for(nodes.len()) {
            Ok(limits) => limits,
            Err(e) => {
                error!("Cannot compute limits for {} node(s), skipping pass: {}", nodes.len(), e);
                return Err(self.skip_pass(pass_id, e).await);
            }
        };

        info!(
            pass_id = %pass_id,
            "Pass over {} node(s): soft limit {}, hard limit {}",
            nodes.len(),
            limits.soft_limit,
            limits.hard_limit
        );
        if let Some(metrics) = &self.metrics {
            metrics.observe_limits(nodes.len(), limits);
        }
        self.publish(DomainEvent::pass_started(
            pass_id,
            nodes.len(),
            limits.soft_limit,
            limits.hard_limit,
        ))
        .await;

        let scan = match self.scanner.scan_pass(pass_id, &nodes, limits, cancel).await {
            Ok(scan) => scan,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_cancelled();
                }
                return Err(e);
            }
        };

        let dispatch = self.dispatcher.dispatch(pass_id, &scan.plan).await;

        let summary = PassSummary {
            pass_id,
            started_at,
            nodes_total: nodes.len(),
            nodes_scanned: scan.nodes_scanned(),
            nodes_skipped: scan.nodes_skipped(),
            sets_over_limit: scan.sets_over_limit(),
            limits,
            plan: scan.plan,
            dispatch,
            nodes: scan.reports,
            duration: start.elapsed(),
        };

        info!(
            pass_id = %pass_id,
            "Pass complete: {}/{} node(s) scanned, {} set(s) dispatched, {} failed",
            summary.nodes_scanned,
            summary.nodes_total,
            summary.dispatch.dispatched(),
            summary.dispatch.failed()
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_completed(&summary);
        }
        self.publish(DomainEvent::pass_completed(
            pass_id,
            summary.nodes_scanned,
            summary.nodes_skipped,
            summary.dispatch.dispatched(),
            summary.dispatch.failed(),
            summary.duration,
        ))
        .await;

        Ok(summary)
    }

    async fn skip_pass(&self, pass_id: Uuid, reason: Error) -> Error {
        if let Some(metrics) = &self.metrics {
            metrics.record_skipped();
        }
        self.publish(DomainEvent::pass_skipped(pass_id, reason.to_string()))
            .await;
        reason
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.events.publish(event).await {
            warn!("Failed to publish event: {}", e);
        }
    }
}

impl std::fmt::Debug for LruController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruController")
            .field("config", &self.config)
            .field("scanner", &self.scanner)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

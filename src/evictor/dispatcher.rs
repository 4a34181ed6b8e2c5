//! Eviction Dispatcher - "The Hands"
//!
//! Issues one cluster-wide remove-by-age call per set with a non-zero cutoff.
//! A failing set is logged and reported; the others still run.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::plan::{EvictionDecision, EvictionPlan};
use crate::domain::events::DomainEvent;
use crate::domain::ports::{EventPublisher, EvictionExecutor};
use crate::error::{Error, Result};

/// Default upper bound for one remove-by-age call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(20 * 60);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the eviction dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Namespace holding the managed sets
    pub namespace: String,

    /// Log intended removals without issuing them
    pub dry_run: bool,

    /// Upper bound for a single remove-by-age call, job completion included
    pub call_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            namespace: "persisted".to_string(),
            dry_run: false,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::Config("namespace must not be empty".to_string()));
        }
        if self.call_timeout.is_zero() {
            return Err(Error::Config("call_timeout must be positive".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Dispatch Report
// =============================================================================

/// Result of one set's dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Removal ran to completion
    Dispatched,
    /// Dry run: logged, not issued
    Skipped,
    /// Removal failed
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub set_name: String,
    pub cutoff_secs: u64,
    pub status: DispatchStatus,
}

/// Per-set results of one dispatch round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    fn count(&self, pred: impl Fn(&DispatchStatus) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.status)).count()
    }

    pub fn dispatched(&self) -> usize {
        self.count(|s| matches!(s, DispatchStatus::Dispatched))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, DispatchStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, DispatchStatus::Failed { .. }))
    }

    /// Result for `set_name`, if it was part of the plan
    pub fn result_for(&self, set_name: &str) -> Option<&DispatchResult> {
        self.results.iter().find(|r| r.set_name == set_name)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Runs the removals of an eviction plan
pub struct EvictionDispatcher {
    config: DispatcherConfig,
    executor: Arc<dyn EvictionExecutor>,
    events: Arc<dyn EventPublisher>,
}

impl EvictionDispatcher {
    pub fn new(
        config: DispatcherConfig,
        executor: Arc<dyn EvictionExecutor>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            config,
            executor,
            events,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Dispatch every actionable decision of `plan`, in set-name order.
    #[instrument(skip_all, fields(pass_id = %pass_id, sets = plan.len()))]
    pub async fn dispatch(&self, pass_id: Uuid, plan: &EvictionPlan) -> DispatchReport {
        let mut report = DispatchReport::default();

        for decision in plan.actionable() {
            let status = self.dispatch_one(pass_id, &decision).await;
            report.results.push(DispatchResult {
                set_name: decision.set_name,
                cutoff_secs: decision.cutoff_secs,
                status,
            });
        }

        report
    }

    async fn dispatch_one(&self, pass_id: Uuid, decision: &EvictionDecision) -> DispatchStatus {
        let set_name = decision.set_name.as_str();
        let cutoff = decision.cutoff_secs;

        if self.config.dry_run {
            info!(
                "[dry-run] Would remove items with ttl less than {} on set {}",
                cutoff, set_name
            );
            self.publish(DomainEvent::eviction_dispatched(pass_id, set_name, cutoff, true))
                .await;
            return DispatchStatus::Skipped;
        }

        info!("Remove items with ttl less than {} on set {}", cutoff, set_name);
        match self.call(set_name, cutoff).await {
            Ok(()) => {
                self.publish(DomainEvent::eviction_dispatched(pass_id, set_name, cutoff, false))
                    .await;
                DispatchStatus::Dispatched
            }
            Err(e) => {
                error!("Eviction of set {} (cutoff {}s) failed: {}", set_name, cutoff, e);
                self.publish(DomainEvent::eviction_failed(
                    pass_id,
                    set_name,
                    cutoff,
                    e.to_string(),
                ))
                .await;
                DispatchStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn call(&self, set_name: &str, cutoff_secs: u64) -> Result<()> {
        let call = self
            .executor
            .remove_older_than(&self.config.namespace, set_name, cutoff_secs);

        let result = tokio::time::timeout(self.config.call_timeout, call)
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("remove-by-age on set {}", set_name),
            })?;

        result.map_err(|e| match e {
            Error::Dispatch { .. } => e,
            other => Error::Dispatch {
                set_name: set_name.to_string(),
                reason: other.to_string(),
            },
        })
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.events.publish(event).await {
            warn!("Failed to publish event: {}", e);
        }
    }
}

impl std::fmt::Debug for EvictionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionDispatcher")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DispatchCall, InMemoryCluster, InMemoryEventCollector};
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    fn dispatcher(
        executor: Arc<dyn EvictionExecutor>,
        events: &Arc<InMemoryEventCollector>,
        dry_run: bool,
    ) -> EvictionDispatcher {
        EvictionDispatcher::new(
            DispatcherConfig {
                dry_run,
                ..Default::default()
            },
            executor,
            events.clone(),
        )
    }

    fn plan(decisions: &[(&str, u64)]) -> EvictionPlan {
        decisions
            .iter()
            .map(|(set, cutoff)| EvictionDecision::new(*set, *cutoff))
            .collect()
    }

    #[test]
    fn test_dispatcher_config_validate() {
        assert!(DispatcherConfig::default().validate().is_ok());
        assert_matches!(
            DispatcherConfig {
                namespace: String::new(),
                ..Default::default()
            }
            .validate(),
            Err(Error::Config(_))
        );
        assert_matches!(
            DispatcherConfig {
                call_timeout: Duration::ZERO,
                ..Default::default()
            }
            .validate(),
            Err(Error::Config(_))
        );
    }

    #[tokio::test]
    async fn test_dispatches_each_actionable_set_once() {
        let cluster = Arc::new(InMemoryCluster::new());
        let events = Arc::new(InMemoryEventCollector::new());

        let report = dispatcher(cluster.clone(), &events, false)
            .dispatch(Uuid::new_v4(), &plan(&[("lru", 7200), ("idle", 0)]))
            .await;

        assert_eq!(report.dispatched(), 1);
        assert!(report.result_for("idle").is_none());
        assert_eq!(
            cluster.dispatches(),
            vec![DispatchCall {
                namespace: "persisted".to_string(),
                set_name: "lru".to_string(),
                cutoff_secs: 7200,
            }]
        );
        assert_eq!(events.events_of_type("EvictionDispatched").len(), 1);
    }

    #[tokio::test]
    async fn test_failing_set_does_not_block_others() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.fail_dispatch_for("a");
        let events = Arc::new(InMemoryEventCollector::new());

        let report = dispatcher(cluster.clone(), &events, false)
            .dispatch(Uuid::new_v4(), &plan(&[("a", 60), ("b", 120)]))
            .await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.dispatched(), 1);
        assert_matches!(
            report.result_for("a").map(|r| &r.status),
            Some(DispatchStatus::Failed { .. })
        );
        assert_eq!(cluster.dispatches().len(), 2);
        assert_eq!(events.events_of_type("EvictionFailed").len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_issues_nothing() {
        let cluster = Arc::new(InMemoryCluster::new());
        let events = Arc::new(InMemoryEventCollector::new());

        let report = dispatcher(cluster.clone(), &events, true)
            .dispatch(Uuid::new_v4(), &plan(&[("lru", 7200)]))
            .await;

        assert_eq!(report.skipped(), 1);
        assert_eq!(report.dispatched(), 0);
        assert!(cluster.dispatches().is_empty());
    }

    struct SlowExecutor;

    #[async_trait]
    impl EvictionExecutor for SlowExecutor {
        async fn remove_older_than(&self, _: &str, _: &str, _: u64) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_fails_the_set() {
        let events = Arc::new(InMemoryEventCollector::new());
        let dispatcher = EvictionDispatcher::new(
            DispatcherConfig {
                call_timeout: Duration::from_secs(10),
                ..Default::default()
            },
            Arc::new(SlowExecutor),
            events.clone(),
        );

        let report = dispatcher
            .dispatch(Uuid::new_v4(), &plan(&[("lru", 7200)]))
            .await;

        assert_eq!(report.failed(), 1);
    }

    /// Never finishes removals on `lru`; other sets complete at once
    struct StalledExecutor;

    #[async_trait]
    impl EvictionExecutor for StalledExecutor {
        async fn remove_older_than(&self, _: &str, set_name: &str, _: u64) -> Result<()> {
            if set_name == "lru" {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_job_fails_under_default_bound() {
        let events = Arc::new(InMemoryEventCollector::new());
        let dispatcher = EvictionDispatcher::new(
            DispatcherConfig::default(),
            Arc::new(StalledExecutor),
            events.clone(),
        );

        let started = tokio::time::Instant::now();
        let report = dispatcher
            .dispatch(Uuid::new_v4(), &plan(&[("lru", 7200), ("other", 60)]))
            .await;

        assert!(started.elapsed() >= DEFAULT_CALL_TIMEOUT);
        assert_matches!(
            report.result_for("lru").map(|r| &r.status),
            Some(DispatchStatus::Failed { .. })
        );
        assert_eq!(
            report.result_for("other").map(|r| &r.status),
            Some(&DispatchStatus::Dispatched)
        );
        assert_eq!(events.events_of_type("EvictionFailed").len(), 1);
    }
}

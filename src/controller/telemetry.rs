//! Controller metrics
//!
//! Prometheus collectors updated after every pass, kept in a dedicated
//! registry so the binary and tests do not share global state.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use super::lru::PassSummary;
use crate::error::{Error, Result};
use crate::evictor::DispatchStatus;
use crate::policy::WatermarkLimits;

const NAMESPACE: &str = "aerolru";

/// Collectors for the control loop
#[derive(Clone)]
pub struct ControllerMetrics {
    registry: Registry,
    passes: IntCounterVec,
    nodes_skipped: IntCounter,
    sets_over_limit: IntCounter,
    evictions: IntCounterVec,
    live_nodes: IntGauge,
    soft_limit: IntGauge,
    hard_limit: IntGauge,
    last_cutoff: IntGaugeVec,
    pass_duration: Histogram,
}

fn gauge_value(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

impl ControllerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let reg_err = |e: prometheus::Error| Error::Internal(format!("metric registration: {}", e));

        let passes = IntCounterVec::new(
            Opts::new("passes_total", "Control loop passes by outcome").namespace(NAMESPACE),
            &["outcome"],
        )
        .map_err(reg_err)?;
        let nodes_skipped = IntCounter::with_opts(
            Opts::new("nodes_skipped_total", "Nodes skipped after a scan failure")
                .namespace(NAMESPACE),
        )
        .map_err(reg_err)?;
        let sets_over_limit = IntCounter::with_opts(
            Opts::new(
                "sets_over_limit_total",
                "Node/set pairs found over the hard limit",
            )
            .namespace(NAMESPACE),
        )
        .map_err(reg_err)?;
        let evictions = IntCounterVec::new(
            Opts::new("evictions_total", "Remove-by-age calls by status").namespace(NAMESPACE),
            &["status"],
        )
        .map_err(reg_err)?;
        let live_nodes = IntGauge::with_opts(
            Opts::new("live_nodes", "Live nodes seen by the last pass").namespace(NAMESPACE),
        )
        .map_err(reg_err)?;
        let soft_limit = IntGauge::with_opts(
            Opts::new("soft_limit_objects", "Per-node soft limit of the last pass")
                .namespace(NAMESPACE),
        )
        .map_err(reg_err)?;
        let hard_limit = IntGauge::with_opts(
            Opts::new("hard_limit_objects", "Per-node hard limit of the last pass")
                .namespace(NAMESPACE),
        )
        .map_err(reg_err)?;
        let last_cutoff = IntGaugeVec::new(
            Opts::new("last_cutoff_seconds", "Last cutoff dispatched per set").namespace(NAMESPACE),
            &["set"],
        )
        .map_err(reg_err)?;
        let pass_duration = Histogram::with_opts(
            HistogramOpts::new("pass_duration_seconds", "Duration of completed passes")
                .namespace(NAMESPACE)
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        )
        .map_err(reg_err)?;

        registry.register(Box::new(passes.clone())).map_err(reg_err)?;
        registry.register(Box::new(nodes_skipped.clone())).map_err(reg_err)?;
        registry.register(Box::new(sets_over_limit.clone())).map_err(reg_err)?;
        registry.register(Box::new(evictions.clone())).map_err(reg_err)?;
        registry.register(Box::new(live_nodes.clone())).map_err(reg_err)?;
        registry.register(Box::new(soft_limit.clone())).map_err(reg_err)?;
        registry.register(Box::new(hard_limit.clone())).map_err(reg_err)?;
        registry.register(Box::new(last_cutoff.clone())).map_err(reg_err)?;
        registry.register(Box::new(pass_duration.clone())).map_err(reg_err)?;

        Ok(Self {
            registry,
            passes,
            nodes_skipped,
            sets_over_limit,
            evictions,
            live_nodes,
            soft_limit,
            hard_limit,
            last_cutoff,
            pass_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every collector in the text exposition format
    pub fn encode_text(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| Error::Internal(format!("metric encoding: {}", e)))?;
        Ok(buffer)
    }

    pub fn observe_limits(&self, live_nodes: usize, limits: WatermarkLimits) {
        self.live_nodes.set(gauge_value(live_nodes as u64));
        self.soft_limit.set(gauge_value(limits.soft_limit));
        self.hard_limit.set(gauge_value(limits.hard_limit));
    }

    pub fn record_skipped(&self) {
        self.passes.with_label_values(&["skipped"]).inc();
    }

    pub fn record_cancelled(&self) {
        self.passes.with_label_values(&["cancelled"]).inc();
    }

    pub fn record_completed(&self, summary: &PassSummary) {
        self.passes.with_label_values(&["completed"]).inc();
        self.nodes_skipped.inc_by(summary.nodes_skipped as u64);
        self.sets_over_limit.inc_by(summary.sets_over_limit as u64);
        self.pass_duration.observe(summary.duration.as_secs_f64());

        for result in &summary.dispatch.results {
            let status = match result.status {
                DispatchStatus::Dispatched => "dispatched",
                DispatchStatus::Skipped => "skipped",
                DispatchStatus::Failed { .. } => "failed",
            };
            self.evictions.with_label_values(&[status]).inc();
            if result.status == DispatchStatus::Dispatched {
                self.last_cutoff
                    .with_label_values(&[result.set_name.as_str()])
                    .set(gauge_value(result.cutoff_secs));
            }
        }
    }
}

impl std::fmt::Debug for ControllerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerMetrics").finish_non_exhaustive()
    }
}

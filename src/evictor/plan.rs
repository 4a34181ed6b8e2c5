//! Eviction decisions and the per-pass plan
//!
//! A plan maps each set to the largest cutoff any node asked for. The
//! remove-by-age call runs cluster-wide and a larger cutoff removes a
//! superset, so the max resolves every node's breach at once.

use std::collections::BTreeMap;

use serde::Serialize;

/// Cutoff proposed for one set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvictionDecision {
    /// Set name
    pub set_name: String,
    /// Remove entries older than this many seconds; 0 means no eviction
    pub cutoff_secs: u64,
}

impl EvictionDecision {
    pub fn new(set_name: impl Into<String>, cutoff_secs: u64) -> Self {
        Self {
            set_name: set_name.into(),
            cutoff_secs,
        }
    }

    /// Whether this decision asks for a removal
    pub fn is_actionable(&self) -> bool {
        self.cutoff_secs > 0
    }
}

/// Set name → merged cutoff for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionPlan {
    cutoffs: BTreeMap<String, u64>,
}

impl EvictionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan with a single decision
    pub fn single(decision: EvictionDecision) -> Self {
        std::iter::once(decision).collect()
    }

    /// Record a proposal, keeping the larger cutoff on conflict
    pub fn with(mut self, decision: EvictionDecision) -> Self {
        let entry = self.cutoffs.entry(decision.set_name).or_insert(0);
        *entry = (*entry).max(decision.cutoff_secs);
        self
    }

    /// Combine two plans, keeping the larger cutoff per set.
    ///
    /// Commutative and associative, so per-node plans can be folded in any
    /// order.
    pub fn merge(self, other: EvictionPlan) -> Self {
        other
            .cutoffs
            .into_iter()
            .map(|(set_name, cutoff_secs)| EvictionDecision { set_name, cutoff_secs })
            .fold(self, EvictionPlan::with)
    }

    /// Merged cutoff for `set_name`
    pub fn cutoff_for(&self, set_name: &str) -> Option<u64> {
        self.cutoffs.get(set_name).copied()
    }

    /// All decisions, ordered by set name
    pub fn decisions(&self) -> impl Iterator<Item = EvictionDecision> + '_ {
        self.cutoffs
            .iter()
            .map(|(set_name, cutoff)| EvictionDecision::new(set_name.clone(), *cutoff))
    }

    /// Decisions with a non-zero cutoff
    pub fn actionable(&self) -> impl Iterator<Item = EvictionDecision> + '_ {
        self.decisions().filter(EvictionDecision::is_actionable)
    }

    pub fn len(&self) -> usize {
        self.cutoffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cutoffs.is_empty()
    }
}

impl FromIterator<EvictionDecision> for EvictionPlan {
    fn from_iter<I: IntoIterator<Item = EvictionDecision>>(iter: I) -> Self {
        iter.into_iter().fold(EvictionPlan::new(), EvictionPlan::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_takes_max_across_nodes() {
        let merged = [5u64, 12, 0, 8]
            .into_iter()
            .map(|cutoff| EvictionPlan::single(EvictionDecision::new("lru", cutoff)))
            .fold(EvictionPlan::new(), EvictionPlan::merge);

        assert_eq!(merged.cutoff_for("lru"), Some(12));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a: EvictionPlan = vec![
            EvictionDecision::new("lru", 7200),
            EvictionDecision::new("tmp", 60),
        ]
        .into_iter()
        .collect();
        let b: EvictionPlan = vec![
            EvictionDecision::new("lru", 3600),
            EvictionDecision::new("other", 10),
        ]
        .into_iter()
        .collect();

        let ab = a.clone().merge(b.clone());
        let ba = b.merge(a);
        assert_eq!(ab, ba);
        assert_eq!(ab.cutoff_for("lru"), Some(7200));
        assert_eq!(ab.cutoff_for("tmp"), Some(60));
        assert_eq!(ab.cutoff_for("other"), Some(10));
    }

    #[test]
    fn test_zero_cutoff_is_not_actionable() {
        let plan: EvictionPlan = vec![
            EvictionDecision::new("lru", 0),
            EvictionDecision::new("tmp", 60),
        ]
        .into_iter()
        .collect();

        let actionable: Vec<_> = plan.actionable().collect();
        assert_eq!(actionable, vec![EvictionDecision::new("tmp", 60)]);
        assert_eq!(plan.decisions().count(), 2);
    }

    #[test]
    fn test_empty_plan() {
        let plan = EvictionPlan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.cutoff_for("lru"), None);
        assert_eq!(plan.actionable().count(), 0);
    }

    #[test]
    fn test_plan_serializes() {
        let plan = EvictionPlan::single(EvictionDecision::new("lru", 7200));
        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(json, r#"{"cutoffs":{"lru":7200}}"#);
    }
}

//! Property-Based Tests for the Eviction Policy
//!
//! # Test Properties
//!
//! 1. **Watermark Ordering**: soft ≤ hard, both positive
//! 2. **Watermark Monotonicity**: limits never grow as nodes are added
//! 3. **Selector No-op**: within soft limit or empty histogram → 0
//! 4. **Selector Monotonicity**: cutoff never shrinks as size grows
//! 5. **Selector Saturation**: not enough entries → last bucket bound
//! 6. **Selector Sufficiency**: a non-saturated cutoff covers the overflow

#![cfg(test)]

use proptest::prelude::*;

use super::threshold::{select_cutoff, NO_EVICTION};
use super::watermark::compute_limits;
use crate::metrics::AgeHistogram;

// =============================================================================
// Property Strategies
// =============================================================================

/// Soft target no larger than the hard target
fn targets_strategy() -> impl Strategy<Value = (u64, u64)> {
    (1u64..=1_000_000_000).prop_flat_map(|hard| (1u64..=hard, Just(hard)))
}

fn histogram_strategy() -> impl Strategy<Value = AgeHistogram> {
    (
        1u64..=86_400,
        prop::collection::vec(prop_oneof![Just(0u64), 0u64..=5_000_000], 0..32),
    )
        .prop_map(|(width, buckets)| AgeHistogram::new(width, buckets).unwrap())
}

// =============================================================================
// Watermark Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: soft never exceeds hard and neither is zero.
    #[test]
    fn prop_soft_below_hard(
        replicas in 1u32..=5,
        nodes in 1usize..=256,
        (soft, hard) in targets_strategy(),
    ) {
        let limits = compute_limits(replicas, nodes, soft, hard)?;
        prop_assert!(limits.soft_limit <= limits.hard_limit);
        prop_assert!(limits.soft_limit > 0);
        prop_assert!(limits.hard_limit > 0);
    }

    /// Property: adding a node never raises either limit.
    #[test]
    fn prop_limits_non_increasing_in_nodes(
        replicas in 1u32..=5,
        nodes in 1usize..=255,
        (soft, hard) in targets_strategy(),
    ) {
        let fewer = compute_limits(replicas, nodes, soft, hard)?;
        let more = compute_limits(replicas, nodes + 1, soft, hard)?;
        prop_assert!(more.hard_limit <= fewer.hard_limit);
        prop_assert!(more.soft_limit <= fewer.soft_limit);
    }
}

// =============================================================================
// Selector Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Property: nothing is evicted while within the soft limit.
    #[test]
    fn prop_noop_within_soft_limit(
        histogram in histogram_strategy(),
        soft in 0u64..=50_000_000,
        below in 0u64..=50_000_000,
    ) {
        let size = soft.saturating_sub(below);
        prop_assert_eq!(select_cutoff(size, soft, &histogram), NO_EVICTION);
    }

    /// Property: an all-zero histogram never yields a cutoff.
    #[test]
    fn prop_noop_on_empty_histogram(
        width in 1u64..=86_400,
        len in 0usize..32,
        size in 0u64..=u64::MAX / 2,
        soft in 0u64..=1_000_000,
    ) {
        let histogram = AgeHistogram::new(width, vec![0; len]).unwrap();
        prop_assert_eq!(select_cutoff(size, soft, &histogram), NO_EVICTION);
    }

    /// Property: a larger set never gets a smaller cutoff.
    #[test]
    fn prop_cutoff_monotonic_in_size(
        histogram in histogram_strategy(),
        soft in 0u64..=50_000_000,
        size in 0u64..=100_000_000,
        growth in 0u64..=100_000_000,
    ) {
        let smaller = select_cutoff(size, soft, &histogram);
        let larger = select_cutoff(size + growth, soft, &histogram);
        prop_assert!(larger >= smaller);
    }

    /// Property: when the histogram cannot cover the overflow, everything it
    /// reports is removed.
    #[test]
    fn prop_saturation(
        histogram in histogram_strategy(),
        soft in 0u64..=50_000_000,
        extra in 1u64..=10_000_000,
    ) {
        prop_assume!(!histogram.is_empty());
        let size = soft + histogram.total() + extra;
        prop_assert_eq!(select_cutoff(size, soft, &histogram), histogram.span_secs());
    }

    /// Property: a cutoff short of saturation removes at least the overflow,
    /// and the previous bucket boundary would not have.
    #[test]
    fn prop_cutoff_is_minimal_and_sufficient(
        histogram in histogram_strategy(),
        soft in 0u64..=50_000_000,
        overflow in 1u64..=50_000_000,
    ) {
        let cutoff = select_cutoff(soft + overflow, soft, &histogram);
        prop_assume!(cutoff != NO_EVICTION && overflow <= histogram.total());

        let width = histogram.bucket_width_secs();
        prop_assert_eq!(cutoff % width, 0);

        let covered = (cutoff / width) as usize;
        let removed: u64 = histogram.buckets()[..covered].iter().sum();
        let removed_before: u64 = histogram.buckets()[..covered - 1].iter().sum();
        prop_assert!(removed >= overflow);
        prop_assert!(removed_before < overflow);
    }
}

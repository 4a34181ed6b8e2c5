//! Eviction Threshold Selector
//!
//! Converts a TTL histogram into the single cutoff handed to the
//! remove-by-age procedure. The sweep starts at bucket 0, the first range
//! the procedure deletes, so a larger cutoff always removes a superset of a
//! smaller one.
//!
//! Occupancy stays authoritative for the size check; the histogram only
//! picks the age boundary.

use tracing::debug;

use crate::metrics::AgeHistogram;

/// Cutoff meaning "no eviction"
pub const NO_EVICTION: u64 = 0;

/// Pick the smallest cutoff that brings `current_size` to at most `soft_limit`.
///
/// Returns [`NO_EVICTION`] when the set is already within the soft limit or
/// the histogram holds no entries. When even the whole histogram is not
/// enough, returns the upper bound of the last bucket.
pub fn select_cutoff(current_size: u64, soft_limit: u64, histogram: &AgeHistogram) -> u64 {
    if current_size <= soft_limit || histogram.is_empty() {
        return NO_EVICTION;
    }

    let overflow = current_size - soft_limit;
    let mut removable = 0u64;

    for (index, count) in histogram.buckets().iter().enumerate() {
        if *count == 0 {
            continue;
        }
        removable = removable.saturating_add(*count);
        if removable >= overflow {
            let cutoff = histogram.upper_bound_secs(index);
            debug!(
                "Cutoff {}s removes {} of {} overflowing entries",
                cutoff, removable, overflow
            );
            return cutoff;
        }
    }

    debug!(
        "Histogram holds {} entries, short of {} overflowing; removing everything it reports",
        removable, overflow
    );
    histogram.span_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(width: u64, buckets: &[u64]) -> AgeHistogram {
        AgeHistogram::new(width, buckets.to_vec()).unwrap()
    }

    // =========================================================================
    // No-op Tests
    // =========================================================================

    #[test]
    fn test_within_soft_limit_is_noop() {
        let h = histogram(3600, &[10, 10, 10]);
        assert_eq!(select_cutoff(100, 100, &h), NO_EVICTION);
        assert_eq!(select_cutoff(50, 100, &h), NO_EVICTION);
    }

    #[test]
    fn test_empty_histogram_is_noop() {
        assert_eq!(select_cutoff(1_000, 10, &histogram(3600, &[0, 0, 0])), NO_EVICTION);
        assert_eq!(select_cutoff(1_000, 10, &histogram(3600, &[])), NO_EVICTION);
    }

    // =========================================================================
    // Sweep Tests
    // =========================================================================

    #[test]
    fn test_first_bucket_sufficient() {
        let h = histogram(60, &[500, 500, 500]);
        assert_eq!(select_cutoff(1_400, 1_000, &h), 60);
    }

    #[test]
    fn test_sweep_starts_at_bucket_zero() {
        // Only the last bucket alone would satisfy the limit; the sweep must
        // still pass through the earlier buckets first.
        let h = histogram(10, &[1, 1, 100]);
        assert_eq!(select_cutoff(150, 100, &h), 30);
    }

    #[test]
    fn test_zero_buckets_are_skipped() {
        let h = histogram(10, &[0, 0, 5, 0, 5]);
        assert_eq!(select_cutoff(105, 100, &h), 30);
    }

    #[test]
    fn test_exact_match_stops_without_overshoot() {
        let h = histogram(100, &[4, 6, 10]);
        // overflow 10 = 4 + 6 exactly
        assert_eq!(select_cutoff(110, 100, &h), 200);
    }

    #[test]
    fn test_one_over_moves_to_next_bucket() {
        let h = histogram(100, &[4, 6, 10]);
        assert_eq!(select_cutoff(111, 100, &h), 300);
    }

    #[test]
    fn test_saturation_returns_last_upper_bound() {
        let h = histogram(100, &[1, 2, 3, 0]);
        assert_eq!(select_cutoff(1_000, 100, &h), 400);
    }

    // =========================================================================
    // Reference Fixtures
    // =========================================================================

    #[test]
    fn test_reference_fixture_saturates() {
        // 26M live, soft 20M: the histogram only reports 2.5M entries, so no
        // bucket boundary gets below the soft limit.
        let h = histogram(3600, &[0, 500_000, 1_000_000, 1_000_000]);
        assert_eq!(select_cutoff(26_000_000, 20_000_000, &h), 4 * 3600);
    }

    #[test]
    fn test_reference_fixture_tie_break() {
        // overflow 500k equals bucket 1 exactly
        let h = histogram(3600, &[0, 500_000, 1_000_000, 1_000_000]);
        assert_eq!(select_cutoff(20_500_000, 20_000_000, &h), 2 * 3600);
    }

    #[test]
    fn test_reference_fixture_third_bucket() {
        let h = histogram(3600, &[0, 500_000, 1_000_000, 1_000_000]);
        assert_eq!(select_cutoff(21_200_000, 20_000_000, &h), 3 * 3600);
    }

    #[test]
    fn test_doubling_overflow_never_shrinks_cutoff() {
        let h = histogram(60, &[3, 0, 7, 2, 9, 1]);
        let soft = 100;
        let mut previous = 0;
        for overflow in [1u64, 2, 4, 8, 16, 32, 64] {
            let cutoff = select_cutoff(soft + overflow, soft, &h);
            assert!(cutoff >= previous);
            previous = cutoff;
        }
    }
}

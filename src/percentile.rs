//! Exact order statistics over a finished trace.
//!
//! Thresholds are computed once per recording, so the whole sample set is
//! available and can simply be sorted. Percentiles use linear interpolation
//! between the two closest ranks: for `n` sorted values the `p` quantile sits
//! at fractional rank `p * (n - 1)`.
//!
//! # Example
//!
//! ```
//! use tms_pulse::percentile::{percentile_sorted, sorted};
//!
//! let values = sorted(vec![4.0, 1.0, 3.0, 2.0, 5.0]);
//! assert_eq!(percentile_sorted(&values, 0.5), Some(3.0));
//! assert_eq!(percentile_sorted(&values, 0.25), Some(2.0));
//! assert_eq!(percentile_sorted(&[], 0.5), None);
//! ```

/// Sorts values ascending. NaNs end up at the top.
pub fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    values
}

/// Returns the `p` quantile (`0.0..=1.0`) of already-sorted values.
///
/// Returns `None` for an empty slice.
///
/// # Panics
///
/// Panics if `p` is outside `[0.0, 1.0]`.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    assert!((0.0..=1.0).contains(&p), "Percentile p must be in [0.0, 1.0]");

    let n = sorted.len();
    if n == 0 {
        return None;
    }

    let rank = p * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    if lo == hi {
        return Some(sorted[lo]);
    }

    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Returns the median of already-sorted values.
#[inline]
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    percentile_sorted(sorted, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_value() {
        assert_eq!(percentile_sorted(&[7.0], 0.0), Some(7.0));
        assert_eq!(percentile_sorted(&[7.0], 0.999), Some(7.0));
        assert_eq!(percentile_sorted(&[7.0], 1.0), Some(7.0));
    }

    #[test]
    fn test_interpolation() {
        let values = sorted((0..=10).map(|i| i as f64 * 10.0).collect());
        // rank = 0.95 * 10 = 9.5 -> halfway between 90 and 100
        let p95 = percentile_sorted(&values, 0.95).unwrap();
        assert!((p95 - 95.0).abs() < 1e-10);
    }

    #[test]
    fn test_p999_of_large_set() {
        let values = sorted((0..10_001).rev().map(|i| i as f64).collect());
        let p = percentile_sorted(&values, 0.999).unwrap();
        assert!((p - 9990.0).abs() < 1e-9);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median_sorted(&[]), None);
    }

    #[test]
    fn test_sorted_handles_negative_and_nan() {
        let values = sorted(vec![2.0, f64::NAN, -3.0, 0.0]);
        assert_eq!(&values[..3], &[-3.0, 0.0, 2.0]);
        assert!(values[3].is_nan());
    }

    #[test]
    #[should_panic]
    fn test_invalid_p() {
        percentile_sorted(&[1.0], 1.5);
    }
}

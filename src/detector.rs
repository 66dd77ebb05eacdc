//! Peak detection: one candidate per pulse discharge.
//!
//! A TMS discharge spans several samples and often rings briefly, so
//! per-sample thresholding would count it many times. The detector instead
//! scans for contiguous runs of member samples and emits exactly one
//! [`Candidate`] per run, placed at the run's extremum.
//!
//! # Example
//!
//! ```
//! use tms_pulse::detector::detect_peaks;
//! use tms_pulse::polarity::Membership;
//!
//! let samples = [0.0, 5.0, 12.0, 9.0, 0.0, 0.0, 11.0, 0.0];
//! let membership = Membership::Above(8.0);
//!
//! let peaks: Vec<_> = detect_peaks(&samples, &membership, 0).collect();
//! assert_eq!(peaks.len(), 2);
//! assert_eq!(peaks[0].index, 2);
//! assert_eq!(peaks[0].amplitude, 12.0);
//! assert_eq!(peaks[1].index, 6);
//! ```

use core::iter::FusedIterator;

use serde::Serialize;

use crate::polarity::Membership;

/// A detected but not yet labeled pulse peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    /// Sample index of the extremum
    pub index: usize,
    /// Signed amplitude at that index
    pub amplitude: f64,
}

/// Lazy scan over a detrended trace yielding [`Candidate`]s.
///
/// Indices are strictly increasing. The iterator is finite and cloneable;
/// calling [`detect_peaks`] again restarts the scan.
#[derive(Debug, Clone)]
pub struct Peaks<'a> {
    samples: &'a [f64],
    membership: &'a Membership,
    refractory: usize,
    position: usize,
}

/// Scans `samples` for runs of members of `membership`.
///
/// Runs separated by at most `refractory` non-member samples are merged into
/// one discharge. With `refractory == 0` every contiguous run stands alone.
pub fn detect_peaks<'a>(
    samples: &'a [f64],
    membership: &'a Membership,
    refractory: usize,
) -> Peaks<'a> {
    Peaks {
        samples,
        membership,
        refractory,
        position: 0,
    }
}

impl Peaks<'_> {
    /// Returns the refractory span in samples.
    pub fn refractory(&self) -> usize {
        self.refractory
    }
}

impl Iterator for Peaks<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        // (index, excess) of the extremum of the current run
        let mut best: Option<(usize, f64)> = None;
        // Non-member samples seen since the run's last member
        let mut quiet = 0usize;

        while self.position < self.samples.len() {
            let i = self.position;
            self.position += 1;

            match self.membership.excess(i, self.samples[i]) {
                Some(excess) => {
                    if best.map_or(true, |(_, b)| excess > b) {
                        best = Some((i, excess));
                    }
                    quiet = 0;
                }
                None if best.is_some() => {
                    quiet += 1;
                    if quiet > self.refractory {
                        break;
                    }
                }
                None => {}
            }
        }

        best.map(|(index, _)| Candidate {
            index,
            amplitude: self.samples[index],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // At most one candidate per two samples (member + separator)
        let remaining = self.samples.len() - self.position;
        (0, Some(remaining.div_ceil(2)))
    }
}

impl FusedIterator for Peaks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polarity::Boundary;
    use std::sync::Arc;

    fn indices(peaks: Peaks<'_>) -> Vec<usize> {
        peaks.map(|c| c.index).collect()
    }

    #[test]
    fn test_empty_and_quiet_traces() {
        let membership = Membership::Above(10.0);
        assert_eq!(detect_peaks(&[], &membership, 0).count(), 0);
        assert_eq!(detect_peaks(&[1.0; 100], &membership, 0).count(), 0);
    }

    #[test]
    fn test_one_candidate_per_run() {
        // Oscillatory discharge: several samples above threshold
        let samples = [0.0, 20.0, 50.0, 35.0, 60.0, 15.0, 0.0];
        let membership = Membership::Above(10.0);

        let peaks: Vec<_> = detect_peaks(&samples, &membership, 0).collect();
        assert_eq!(
            peaks,
            vec![Candidate {
                index: 4,
                amplitude: 60.0
            }]
        );
    }

    #[test]
    fn test_tie_keeps_earliest_sample() {
        let samples = [0.0, 50.0, 50.0, 0.0];
        let membership = Membership::Above(10.0);
        assert_eq!(indices(detect_peaks(&samples, &membership, 0)), vec![1]);
    }

    #[test]
    fn test_run_open_at_end_is_emitted() {
        let samples = [0.0, 0.0, 30.0, 40.0];
        let membership = Membership::Above(10.0);
        assert_eq!(indices(detect_peaks(&samples, &membership, 0)), vec![3]);
    }

    #[test]
    fn test_negative_polarity_takes_minimum() {
        let samples = [0.0, -20.0, -90.0, -40.0, 0.0, -70.0, 0.0];
        let membership = Membership::Below(-10.0);

        let peaks: Vec<_> = detect_peaks(&samples, &membership, 0).collect();
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].index, 2);
        assert_eq!(peaks[0].amplitude, -90.0);
        assert_eq!(peaks[1].index, 5);
    }

    #[test]
    fn test_interactive_excess_picks_extremum() {
        // Boundary rises along the trace; excess, not raw amplitude, decides
        let boundary: Arc<dyn Boundary + Send + Sync> =
            Arc::new(|i: usize| (10.0 * i as f64, -1000.0));
        let membership = Membership::Outside(boundary);
        let samples = [0.0, 30.0, 35.0, 0.0];

        // excess at 1: 20, at 2: 15
        assert_eq!(indices(detect_peaks(&samples, &membership, 0)), vec![1]);
    }

    #[test]
    fn test_refractory_merges_ringing() {
        let samples = [0.0, 80.0, 0.0, 0.0, 95.0, 0.0, 0.0, 0.0, 0.0, 70.0, 0.0];
        let membership = Membership::Above(50.0);

        assert_eq!(indices(detect_peaks(&samples, &membership, 0)), vec![1, 4, 9]);
        // Gap of two samples between 1 and 4 is bridged, four samples to 9 is not
        assert_eq!(indices(detect_peaks(&samples, &membership, 2)), vec![4, 9]);
        assert_eq!(indices(detect_peaks(&samples, &membership, 4)), vec![4]);
    }

    #[test]
    fn test_strictly_increasing_indices() {
        let samples: Vec<f64> = (0..5000)
            .map(|i| 100.0 * libm::sin(i as f64 * 0.13) * libm::sin(i as f64 * 0.0071))
            .collect();
        let membership = Membership::Above(40.0);

        let found = indices(detect_peaks(&samples, &membership, 0));
        assert!(!found.is_empty());
        assert!(found.windows(2).all(|w| w[0] < w[1]));
        assert!(found.iter().all(|&i| i < samples.len()));
    }

    #[test]
    fn test_restartable() {
        let samples = [0.0, 20.0, 0.0, 30.0, 0.0];
        let membership = Membership::Above(10.0);

        let mut peaks = detect_peaks(&samples, &membership, 0);
        let snapshot = peaks.clone();
        assert_eq!(peaks.next().map(|c| c.index), Some(1));
        assert_eq!(indices(snapshot), vec![1, 3]);
        assert_eq!(indices(detect_peaks(&samples, &membership, 0)), vec![1, 3]);
        assert_eq!(peaks.refractory(), 0);
    }
}

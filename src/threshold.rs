//! Threshold policies separating artifact-range samples from ongoing EEG.
//!
//! Three strategies produce an `(upper, lower)` pair in the trace's amplitude
//! units:
//!
//! - [`ThresholdSpec::Dynamic`] - 99.9th percentile of the excursions in each
//!   direction. A handful of artifact samples barely move it while ordinary
//!   EEG sits well below.
//! - [`ThresholdSpec::Median`] - median of the excursions at or beyond that
//!   percentile, which is less sensitive to a single extreme outlier.
//! - [`ThresholdSpec::Manual`] - a fixed magnitude, mirrored for the negative
//!   direction.
//!
//! Positive excursions are samples above zero and negative excursions samples
//! below zero, so thresholds are meaningful only on a detrended trace.
//!
//! # Example
//!
//! ```
//! use tms_pulse::threshold::{compute_thresholds, ThresholdSpec};
//!
//! let samples = vec![0.0; 100];
//! let t = compute_thresholds(&samples, &ThresholdSpec::Manual(1000.0)).unwrap();
//!
//! assert_eq!(t.upper, 1000.0);
//! assert_eq!(t.lower, -1000.0);
//! ```

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FindPulseError, Result};
use crate::percentile::{median_sorted, percentile_sorted, sorted};

/// Percentile used by the dynamic and median policies.
pub const DYNAMIC_PERCENTILE: f64 = 0.999;

/// Fewest samples a threshold can be computed from.
pub const MIN_SAMPLES: usize = 10;

/// How the detection thresholds are derived.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(try_from = "ThresholdRepr")]
pub enum ThresholdSpec {
    /// 99.9th percentile of the excursions in each direction
    ///
    /// Assumes a noise-bearing trace. On a near-flat trace the percentile
    /// lands on detrending residuals, so small fluctuations become candidates
    /// alongside the pulses; use [`ThresholdSpec::Manual`] for such input.
    #[default]
    Dynamic,
    /// Median of the excursions beyond the 99.9th percentile
    Median,
    /// Fixed magnitude in amplitude units
    Manual(f64),
}

/// Config-file form: a policy name or a bare number.
#[derive(Deserialize)]
#[serde(untagged)]
enum ThresholdRepr {
    Value(f64),
    Name(String),
}

impl TryFrom<ThresholdRepr> for ThresholdSpec {
    type Error = FindPulseError;

    fn try_from(repr: ThresholdRepr) -> Result<Self> {
        match repr {
            ThresholdRepr::Value(v) => ThresholdSpec::manual(v),
            ThresholdRepr::Name(name) => name.parse(),
        }
    }
}

impl ThresholdSpec {
    /// Creates a manual threshold, rejecting non-finite values.
    pub fn manual(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(FindPulseError::invalid(format!(
                "manual threshold must be finite, got {value}"
            )));
        }
        Ok(ThresholdSpec::Manual(value))
    }
}

impl FromStr for ThresholdSpec {
    type Err = FindPulseError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "dynamic" => Ok(ThresholdSpec::Dynamic),
            "median" => Ok(ThresholdSpec::Median),
            _ => match s.parse::<f64>() {
                Ok(v) => ThresholdSpec::manual(v),
                Err(_) => Err(FindPulseError::invalid(format!(
                    "unknown threshold type '{s}' (expected dynamic, median or a number)"
                ))),
            },
        }
    }
}

/// Resolved detection thresholds.
///
/// `upper` applies to positive-going excursions and `lower` (normally
/// negative) to negative-going ones. A direction with no excursions at all
/// gets an infinite threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// Threshold for positive excursions
    pub upper: f64,
    /// Threshold for negative excursions
    pub lower: f64,
}

/// Computes the `(upper, lower)` thresholds of a detrended trace.
///
/// # Errors
///
/// - `InsufficientData` if the trace has fewer than [`MIN_SAMPLES`] samples
/// - `InvalidConfig` if a manual value is not finite
pub fn compute_thresholds(samples: &[f64], spec: &ThresholdSpec) -> Result<Thresholds> {
    FindPulseError::require_samples(MIN_SAMPLES, samples.len())?;

    let thresholds = match *spec {
        ThresholdSpec::Manual(value) => {
            if !value.is_finite() {
                return Err(FindPulseError::invalid(format!(
                    "manual threshold must be finite, got {value}"
                )));
            }
            Thresholds {
                upper: value.abs(),
                lower: -value.abs(),
            }
        }
        ThresholdSpec::Dynamic => {
            let (positive, negative) = excursions(samples);
            Thresholds {
                upper: percentile_sorted(&positive, DYNAMIC_PERCENTILE).unwrap_or(f64::INFINITY),
                lower: percentile_sorted(&negative, DYNAMIC_PERCENTILE)
                    .map_or(f64::NEG_INFINITY, |m| -m),
            }
        }
        ThresholdSpec::Median => {
            let (positive, negative) = excursions(samples);
            Thresholds {
                upper: tail_median(&positive).unwrap_or(f64::INFINITY),
                lower: tail_median(&negative).map_or(f64::NEG_INFINITY, |m| -m),
            }
        }
    };

    debug!(
        ?spec,
        upper = thresholds.upper,
        lower = thresholds.lower,
        "resolved thresholds"
    );
    Ok(thresholds)
}

/// Splits samples into sorted positive values and sorted negative magnitudes.
fn excursions(samples: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let positive = samples.iter().copied().filter(|&v| v > 0.0).collect();
    let negative = samples.iter().filter(|&&v| v < 0.0).map(|v| -v).collect();
    (sorted(positive), sorted(negative))
}

/// Median of the values at or beyond the dynamic percentile cutoff.
fn tail_median(sorted: &[f64]) -> Option<f64> {
    let cutoff = percentile_sorted(sorted, DYNAMIC_PERCENTILE)?;
    let start = sorted.partition_point(|&v| v < cutoff);
    median_sorted(&sorted[start..])
}

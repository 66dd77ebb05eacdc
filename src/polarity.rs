//! Polarity selection: which excursions count as pulse samples.
//!
//! The selector turns a [`Polarity`] plus resolved [`Thresholds`] into a
//! [`Membership`] predicate over `(sample_index, amplitude)`. In interactive
//! mode the thresholds are ignored and an operator-drawn [`Boundary`] is used
//! instead; it may bend along the recording to follow drift a single global
//! threshold cannot.

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{FindPulseError, Result};
use crate::threshold::Thresholds;

/// Which excursions define a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Polarity {
    /// Samples at or above the upper threshold
    #[default]
    Positive,
    /// Samples at or below the lower threshold
    Negative,
    /// Samples outside an operator-supplied boundary
    Interactive,
}

impl FromStr for Polarity {
    type Err = FindPulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pos" | "positive" => Ok(Polarity::Positive),
            "neg" | "negative" => Ok(Polarity::Negative),
            "interactive" | "gui" => Ok(Polarity::Interactive),
            other => Err(FindPulseError::invalid(format!(
                "unknown peak polarity '{other}' (expected pos, neg or interactive)"
            ))),
        }
    }
}

impl TryFrom<String> for Polarity {
    type Error = FindPulseError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A threshold that may vary along the recording.
///
/// Returns the `(upper, lower)` bound at a sample index. Any
/// `Fn(usize) -> (f64, f64)` closure is a boundary.
///
/// # Example
///
/// ```
/// use tms_pulse::polarity::Boundary;
///
/// let widening = |i: usize| (100.0 + i as f64, -100.0 - i as f64);
/// assert_eq!(widening.bounds(10), (110.0, -110.0));
/// ```
pub trait Boundary {
    /// Upper and lower bound at `index`.
    fn bounds(&self, index: usize) -> (f64, f64);
}

impl<F> Boundary for F
where
    F: Fn(usize) -> (f64, f64),
{
    fn bounds(&self, index: usize) -> (f64, f64) {
        self(index)
    }
}

/// Piecewise-linear boundary through operator bend points.
///
/// Each curve is a list of `(sample_index, value)` points. Values are
/// interpolated linearly between points and held constant before the first
/// and after the last.
///
/// # Example
///
/// ```
/// use tms_pulse::polarity::{Boundary, PiecewiseBoundary};
///
/// let boundary = PiecewiseBoundary::new(
///     vec![(0, 100.0), (1000, 300.0)],
///     vec![(0, -100.0)],
/// ).unwrap();
///
/// assert_eq!(boundary.bounds(500), (200.0, -100.0));
/// assert_eq!(boundary.bounds(5000), (300.0, -100.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseBoundary {
    upper: Vec<(usize, f64)>,
    lower: Vec<(usize, f64)>,
}

impl PiecewiseBoundary {
    /// Builds a boundary from upper and lower bend points.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a curve is empty, holds a non-finite value,
    /// or its indices are not strictly increasing.
    pub fn new(upper: Vec<(usize, f64)>, lower: Vec<(usize, f64)>) -> Result<Self> {
        validate_curve("upper", &upper)?;
        validate_curve("lower", &lower)?;
        Ok(Self { upper, lower })
    }
}

impl Boundary for PiecewiseBoundary {
    fn bounds(&self, index: usize) -> (f64, f64) {
        (interpolate(&self.upper, index), interpolate(&self.lower, index))
    }
}

fn validate_curve(name: &str, points: &[(usize, f64)]) -> Result<()> {
    if points.is_empty() {
        return Err(FindPulseError::invalid(format!(
            "{name} boundary needs at least one bend point"
        )));
    }
    if let Some((i, v)) = points.iter().find(|(_, v)| !v.is_finite()) {
        return Err(FindPulseError::invalid(format!(
            "{name} boundary value at sample {i} is not finite ({v})"
        )));
    }
    if points.windows(2).any(|w| w[0].0 >= w[1].0) {
        return Err(FindPulseError::invalid(format!(
            "{name} boundary bend points must have strictly increasing sample indices"
        )));
    }
    Ok(())
}

/// Evaluates a validated, non-empty curve at `index`.
fn interpolate(points: &[(usize, f64)], index: usize) -> f64 {
    // First bend point strictly after `index`
    let after = points.partition_point(|&(i, _)| i <= index);

    if after == 0 {
        return points[0].1;
    }
    if after == points.len() {
        return points[points.len() - 1].1;
    }

    let (i0, v0) = points[after - 1];
    let (i1, v1) = points[after];
    let frac = (index - i0) as f64 / (i1 - i0) as f64;
    v0 + frac * (v1 - v0)
}

/// Membership predicate produced by the polarity selector.
///
/// Besides the yes/no decision it reports the *excess* of a member sample:
/// how far beyond its threshold the sample lies. The peak detector keeps the
/// sample with the largest excess in each run, which is the maximum for
/// positive polarity and the minimum for negative polarity.
#[derive(Clone)]
pub enum Membership {
    /// `amplitude >= threshold`
    Above(f64),
    /// `amplitude <= threshold`
    Below(f64),
    /// Amplitude outside the boundary at that index
    Outside(Arc<dyn Boundary + Send + Sync>),
}

impl Membership {
    /// Builds the predicate for `polarity`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `polarity` is interactive and no boundary
    /// was supplied.
    pub fn select(
        polarity: Polarity,
        thresholds: &Thresholds,
        boundary: Option<Arc<dyn Boundary + Send + Sync>>,
    ) -> Result<Self> {
        match polarity {
            Polarity::Positive => Ok(Membership::Above(thresholds.upper)),
            Polarity::Negative => Ok(Membership::Below(thresholds.lower)),
            Polarity::Interactive => boundary.map(Membership::Outside).ok_or_else(|| {
                FindPulseError::invalid("interactive polarity requires a boundary")
            }),
        }
    }

    /// Returns how far `amplitude` lies beyond the threshold, or `None` if
    /// the sample is not a member.
    ///
    /// # Example
    ///
    /// ```
    /// use tms_pulse::polarity::Membership;
    ///
    /// let above = Membership::Above(1000.0);
    /// assert_eq!(above.excess(0, 1500.0), Some(500.0));
    /// assert_eq!(above.excess(0, 1000.0), Some(0.0));
    /// assert_eq!(above.excess(0, 999.0), None);
    /// ```
    #[inline]
    pub fn excess(&self, index: usize, amplitude: f64) -> Option<f64> {
        match self {
            Membership::Above(t) => (amplitude >= *t).then(|| amplitude - t),
            Membership::Below(t) => (amplitude <= *t).then(|| t - amplitude),
            Membership::Outside(boundary) => {
                let (upper, lower) = boundary.bounds(index);
                if amplitude > upper {
                    Some(amplitude - upper)
                } else if amplitude < lower {
                    Some(lower - amplitude)
                } else {
                    None
                }
            }
        }
    }

    /// Returns true if the sample belongs to a pulse.
    #[inline]
    pub fn contains(&self, index: usize, amplitude: f64) -> bool {
        self.excess(index, amplitude).is_some()
    }
}

impl fmt::Debug for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Membership::Above(t) => f.debug_tuple("Above").field(t).finish(),
            Membership::Below(t) => f.debug_tuple("Below").field(t).finish(),
            Membership::Outside(_) => f.write_str("Outside(<boundary>)"),
        }
    }
}

//! Baseline drift removal ahead of thresholding.
//!
//! A TMS discharge spans only a few samples while electrode drift evolves over
//! seconds to minutes. Fitting a low-order polynomial to the whole channel and
//! subtracting it flattens the baseline without touching the pulse itself, so
//! a single global threshold can then be applied.
//!
//! # Modes
//!
//! - [`DetrendMode::Poly`] - subtract a least-squares cubic
//! - [`DetrendMode::Linear`] - subtract the least-squares line
//! - [`DetrendMode::Off`] - pass the samples through unchanged
//!
//! # Example
//!
//! ```
//! use tms_pulse::detrend::{detrend, DetrendMode};
//!
//! // Pure ramp: the linear fit removes it completely
//! let ramp: Vec<f64> = (0..100).map(|i| 0.5 * i as f64 + 3.0).collect();
//! let flat = detrend(&ramp, DetrendMode::Linear).unwrap();
//!
//! assert_eq!(flat.len(), ramp.len());
//! assert!(flat.iter().all(|v| v.abs() < 1e-9));
//! ```

use core::ops::Deref;
use core::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::error::{FindPulseError, Result};
use crate::linalg::Matrix;

/// Degree of the polynomial removed by [`DetrendMode::Poly`].
pub const POLY_DEGREE: usize = 3;

/// Drift removal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DetrendMode {
    /// Least-squares cubic baseline
    #[default]
    Poly,
    /// Least-squares straight line
    Linear,
    /// No detrending
    Off,
}

impl DetrendMode {
    /// Number of samples needed to fit the baseline.
    pub fn min_samples(&self) -> usize {
        match self {
            DetrendMode::Poly => POLY_DEGREE + 1,
            DetrendMode::Linear => 2,
            DetrendMode::Off => 0,
        }
    }
}

impl FromStr for DetrendMode {
    type Err = FindPulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poly" => Ok(DetrendMode::Poly),
            "linear" => Ok(DetrendMode::Linear),
            "off" | "none" => Ok(DetrendMode::Off),
            other => Err(FindPulseError::invalid(format!(
                "unknown detrend mode '{other}' (expected poly, linear or off)"
            ))),
        }
    }
}

impl TryFrom<String> for DetrendMode {
    type Error = FindPulseError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A channel with its slow baseline removed.
///
/// Same length as the trace it was derived from. Dereferences to `[f64]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetrendedTrace {
    samples: Vec<f64>,
}

impl Deref for DetrendedTrace {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.samples
    }
}

/// Removes slow drift from `samples` according to `mode`.
///
/// # Errors
///
/// Returns `InsufficientData` if there are fewer samples than polynomial
/// coefficients to fit.
///
/// # Example
///
/// ```
/// use tms_pulse::detrend::{detrend, DetrendMode};
///
/// let samples = [1.0, 2.0, 3.0];
/// let same = detrend(&samples, DetrendMode::Off).unwrap();
/// assert_eq!(&same[..], &samples[..]);
/// ```
pub fn detrend(samples: &[f64], mode: DetrendMode) -> Result<DetrendedTrace> {
    FindPulseError::require_samples(mode.min_samples(), samples.len())?;

    let samples = match mode {
        DetrendMode::Off => samples.to_vec(),
        DetrendMode::Linear => subtract_polynomial::<2, 4>(samples)?,
        DetrendMode::Poly => subtract_polynomial::<{ POLY_DEGREE + 1 }, 16>(samples)?,
    };

    debug!(?mode, samples = samples.len(), "detrended trace");
    Ok(DetrendedTrace { samples })
}

/// Maps sample index to the abscissa used for fitting, in `[-1, 1]`.
#[inline]
fn abscissa(index: usize, len: usize) -> f64 {
    if len < 2 {
        return 0.0;
    }
    2.0 * index as f64 / (len - 1) as f64 - 1.0
}

#[inline]
fn powers<const C: usize>(x: f64) -> [f64; C] {
    let mut p = [1.0; C];
    for k in 1..C {
        p[k] = p[k - 1] * x;
    }
    p
}

/// Fits a polynomial with `C` coefficients by least squares and returns the residuals.
fn subtract_polynomial<const C: usize, const M: usize>(samples: &[f64]) -> Result<Vec<f64>> {
    let n = samples.len();
    let mut normal: Matrix<C, M> = Matrix::zeros();
    let mut rhs = [0.0; C];

    for (i, &y) in samples.iter().enumerate() {
        let p = powers::<C>(abscissa(i, n));
        for j in 0..C {
            rhs[j] += p[j] * y;
            for k in 0..C {
                normal.accumulate(j, k, p[j] * p[k]);
            }
        }
    }

    let coeffs = normal
        .solve(&rhs)
        .map_err(|_| FindPulseError::InsufficientData {
            required: C,
            available: n,
        })?;

    Ok(samples
        .iter()
        .enumerate()
        .map(|(i, &y)| {
            let p = powers::<C>(abscissa(i, n));
            let baseline: f64 = p.iter().zip(coeffs.iter()).map(|(a, c)| a * c).sum();
            y - baseline
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_abs(values: &[f64]) -> f64 {
        values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("poly".parse::<DetrendMode>().unwrap(), DetrendMode::Poly);
        assert_eq!("Linear".parse::<DetrendMode>().unwrap(), DetrendMode::Linear);
        assert_eq!("off".parse::<DetrendMode>().unwrap(), DetrendMode::Off);
        assert!(matches!(
            "spline".parse::<DetrendMode>(),
            Err(FindPulseError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_off_is_identity() {
        let samples = [3.0, -1.0, 4.0, 1.0, -5.0];
        let out = detrend(&samples, DetrendMode::Off).unwrap();
        assert_eq!(&out[..], &samples[..]);
    }

    #[test]
    fn test_linear_removes_offset_and_slope() {
        let samples: Vec<f64> = (0..500).map(|i| 100.0 - 0.25 * i as f64).collect();
        let out = detrend(&samples, DetrendMode::Linear).unwrap();
        assert!(max_abs(&out) < 1e-8);
    }

    #[test]
    fn test_linear_is_idempotent() {
        // Flat baseline with noise-like pattern and one pulse
        let mut samples: Vec<f64> = (0..2000)
            .map(|i| 5.0 * libm::sin(i as f64 * 0.37) + 0.01 * i as f64)
            .collect();
        samples[700] += 900.0;

        let once = detrend(&samples, DetrendMode::Linear).unwrap();
        let twice = detrend(&once, DetrendMode::Linear).unwrap();

        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn test_poly_removes_cubic_drift() {
        let n = 1000;
        let samples: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                20.0 + 50.0 * t - 80.0 * t * t + 30.0 * t * t * t
            })
            .collect();
        let out = detrend(&samples, DetrendMode::Poly).unwrap();
        assert!(max_abs(&out) < 1e-6);
    }

    #[test]
    fn test_poly_preserves_narrow_pulse() {
        let n = 10_000;
        let mut samples: Vec<f64> = (0..n).map(|i| 0.02 * i as f64).collect();
        for (k, v) in [400.0, 1500.0, 2000.0, 1200.0, 300.0].iter().enumerate() {
            samples[5000 + k] += v;
        }

        let out = detrend(&samples, DetrendMode::Poly).unwrap();

        // Pulse height survives almost untouched, baseline is near zero
        assert!((out[5002] - 2000.0).abs() < 5.0);
        assert!(out[100].abs() < 5.0);
        assert!(out[9_900].abs() < 5.0);
    }

    #[test]
    fn test_too_few_samples() {
        assert_eq!(
            detrend(&[1.0, 2.0, 3.0], DetrendMode::Poly),
            Err(FindPulseError::InsufficientData {
                required: 4,
                available: 3
            })
        );
        assert!(detrend(&[1.0], DetrendMode::Linear).is_err());
        assert!(detrend(&[], DetrendMode::Off).unwrap().is_empty());
    }
}

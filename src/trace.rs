//! Single-channel input traces and time conversions.

use crate::error::{FindPulseError, Result};

/// One channel of a continuous recording.
///
/// The trace borrows its samples and is never modified by the pipeline.
///
/// # Example
///
/// ```
/// use tms_pulse::Trace;
///
/// let samples = vec![0.0; 1000];
/// let trace = Trace::new(&samples, 1000.0).unwrap();
///
/// assert_eq!(trace.len(), 1000);
/// assert_eq!(trace.ms_to_samples(20.0), 20.0);
/// assert_eq!(trace.samples_to_ms(5), 5.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Trace<'a> {
    samples: &'a [f64],
    sampling_rate: f64,
}

impl<'a> Trace<'a> {
    /// Wraps a sample slice recorded at `sampling_rate` Hz.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the sampling rate is not a finite positive number.
    pub fn new(samples: &'a [f64], sampling_rate: f64) -> Result<Self> {
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(FindPulseError::invalid(format!(
                "sampling rate must be a positive finite number, got {sampling_rate}"
            )));
        }

        Ok(Self {
            samples,
            sampling_rate,
        })
    }

    /// Returns the raw samples.
    #[inline]
    pub fn samples(&self) -> &'a [f64] {
        self.samples
    }

    /// Returns the sampling rate in Hz.
    #[inline]
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Returns the number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the trace holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Converts a duration in milliseconds to a (fractional) sample count.
    #[inline]
    pub fn ms_to_samples(&self, ms: f64) -> f64 {
        ms * self.sampling_rate / 1000.0
    }

    /// Converts a sample count to milliseconds.
    #[inline]
    pub fn samples_to_ms(&self, samples: usize) -> f64 {
        samples as f64 * 1000.0 / self.sampling_rate
    }

    /// Duration of one sample in milliseconds.
    #[inline]
    pub fn sample_period_ms(&self) -> f64 {
        1000.0 / self.sampling_rate
    }
}

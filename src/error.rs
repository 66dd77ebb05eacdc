//! Error types for pulse detection.
//!
//! Every fatal condition aborts the whole invocation before the host event
//! list is touched. Non-fatal conditions (train count mismatches) are not
//! errors; they travel as [`Diagnostic`](crate::grouping::Diagnostic)s next to
//! a successful [`Detection`](crate::pipeline::Detection).

use thiserror::Error;

/// Errors produced by the pulse-finding pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FindPulseError {
    /// Malformed or contradictory options.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Trace too short to compute a required statistic.
    #[error("insufficient data: need at least {required} samples, got {available}")]
    InsufficientData {
        /// Minimum number of samples the stage needs
        required: usize,
        /// Number of samples in the trace
        available: usize,
    },
}

impl FindPulseError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    pub(crate) fn require_samples(required: usize, available: usize) -> Result<()> {
        if available < required {
            return Err(Self::InsufficientData {
                required,
                available,
            });
        }
        Ok(())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, FindPulseError>;

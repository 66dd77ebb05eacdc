//! End-to-end pulse finding.
//!
//! [`PulseFinder`] chains the stages over one channel:
//!
//! ```text
//! Trace ─► detrend ─► thresholds ─► membership ─► peaks ─► grouping ─► Detection
//!                                                                       │
//!                                                      annotate(host) ◄─┘
//! ```
//!
//! Running never touches the host. Events are written only by
//! [`Detection::annotate`] (or [`PulseFinder::annotate_recording`]) after
//! every stage has succeeded, so a failing configuration leaves the event
//! list as it was.
//!
//! # Example
//!
//! ```
//! use tms_pulse::{FindPulseConfig, PulseFinder, Trace};
//! use tms_pulse::threshold::ThresholdSpec;
//!
//! let mut samples = vec![0.0; 10_000];
//! samples[5000] = 2000.0;
//!
//! let config = FindPulseConfig {
//!     thrshtype: ThresholdSpec::Manual(1000.0),
//!     ..FindPulseConfig::default()
//! };
//! let finder = PulseFinder::new(config).unwrap();
//! let detection = finder.run(&Trace::new(&samples, 1000.0).unwrap()).unwrap();
//!
//! let mut events = Vec::new();
//! detection.annotate(&mut events).unwrap();
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].event_type, "TMS");
//! assert_eq!(events[0].latency, 5000);
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::annotate::{self, EventHost, EventRecord, Recording};
use crate::config::FindPulseConfig;
use crate::detector::{detect_peaks, Candidate};
use crate::detrend::detrend;
use crate::error::{FindPulseError, Result};
use crate::grouping::{group_pulses, Diagnostic, LabeledPulse, PulseGroup};
use crate::polarity::{Boundary, Membership};
use crate::threshold::{compute_thresholds, Thresholds};
use crate::trace::Trace;

/// Result of one pulse-finding run.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Thresholds used for detection
    pub thresholds: Thresholds,
    /// Unlabeled peaks in scan order
    pub candidates: Vec<Candidate>,
    /// Pulse groups in protocol order
    pub groups: Vec<PulseGroup>,
    /// Labeled pulses ordered by sample index
    pub pulses: Vec<LabeledPulse>,
    /// Non-fatal findings such as train count mismatches
    pub diagnostics: Vec<Diagnostic>,
    trace_len: usize,
}

impl Detection {
    /// Number of samples in the analysed trace.
    pub fn trace_len(&self) -> usize {
        self.trace_len
    }

    /// Event records for the labeled pulses.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a latency falls outside the trace.
    pub fn events(&self) -> Result<Vec<EventRecord>> {
        annotate::to_event_records(&self.pulses, self.trace_len)
    }

    /// Appends the events to `host`, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a latency falls outside the trace; the
    /// host is then unchanged.
    pub fn annotate<H>(&self, host: &mut H) -> Result<usize>
    where
        H: EventHost + ?Sized,
    {
        annotate::annotate(host, &self.pulses, self.trace_len)
    }
}

/// Configured pulse finder.
///
/// Holds only immutable settings and can be shared between threads to
/// process several recordings.
#[derive(Clone)]
pub struct PulseFinder {
    config: FindPulseConfig,
    boundary: Option<Arc<dyn Boundary + Send + Sync>>,
}

impl PulseFinder {
    /// Validates `config` and builds a finder.
    ///
    /// A `boundary` section in the configuration becomes the interactive
    /// boundary; [`with_boundary`](Self::with_boundary) replaces it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration is inconsistent.
    pub fn new(config: FindPulseConfig) -> Result<Self> {
        config.validate()?;
        let boundary = config
            .boundary()?
            .map(|b| Arc::new(b) as Arc<dyn Boundary + Send + Sync>);
        Ok(Self { config, boundary })
    }

    /// Uses `boundary` for interactive polarity.
    pub fn with_boundary<B>(mut self, boundary: B) -> Self
    where
        B: Boundary + Send + Sync + 'static,
    {
        self.boundary = Some(Arc::new(boundary));
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FindPulseConfig {
        &self.config
    }

    /// Finds and labels pulses in `trace`.
    ///
    /// # Errors
    ///
    /// - `InsufficientData` if the trace is too short to detrend or threshold
    /// - `InvalidConfig` if interactive polarity has no boundary
    pub fn run(&self, trace: &Trace<'_>) -> Result<Detection> {
        let config = &self.config;
        let mode = config.grouping_mode()?;

        let detrended = detrend(trace.samples(), config.dtrend)?;
        let thresholds = compute_thresholds(&detrended, &config.thrshtype)?;
        let membership = Membership::select(config.wpeaks, &thresholds, self.boundary.clone())?;

        let refractory = refractory_samples(trace, config.refractory_ms);
        let candidates: Vec<Candidate> = detect_peaks(&detrended, &membership, refractory).collect();
        debug!(
            candidates = candidates.len(),
            refractory,
            ?membership,
            "detected peaks"
        );

        let grouping = group_pulses(&candidates, mode, &config.tms_label, trace.sampling_rate())?;
        info!(
            events = grouping.pulses.len(),
            groups = grouping.groups.len(),
            diagnostics = grouping.diagnostics.len(),
            "pulse search finished"
        );

        Ok(Detection {
            thresholds,
            candidates,
            groups: grouping.groups,
            pulses: grouping.pulses,
            diagnostics: grouping.diagnostics,
            trace_len: trace.len(),
        })
    }

    /// Runs on a channel of `recording` and appends the events to it.
    ///
    /// The channel is the configured `channel`, or the first channel if none
    /// is configured.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the channel does not exist, plus any error
    /// of [`run`](Self::run). On error no events are appended.
    pub fn annotate_recording(&self, recording: &mut Recording) -> Result<Detection> {
        let label = match &self.config.channel {
            Some(label) => label.clone(),
            None => recording
                .channel_labels()
                .next()
                .map(str::to_string)
                .ok_or_else(|| FindPulseError::invalid("recording has no channels"))?,
        };
        let trace = recording
            .channel(&label)
            .ok_or_else(|| FindPulseError::invalid(format!("no channel named '{label}'")))?;

        let detection = self.run(&trace)?;
        detection.annotate(recording)?;
        Ok(detection)
    }
}

/// Refractory span in whole samples.
fn refractory_samples(trace: &Trace<'_>, refractory_ms: f64) -> usize {
    libm::round(trace.ms_to_samples(refractory_ms)).max(0.0) as usize
}

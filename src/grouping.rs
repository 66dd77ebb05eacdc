//! Pulse grouping: single, paired and repetitive stimulation.
//!
//! The grouper labels the candidate sequence according to the stimulation
//! protocol:
//!
//! - **Single** - every candidate is one event labeled with the TMS label.
//! - **Paired** - a conditioning pulse followed by a test pulse one configured
//!   inter-stimulus interval (ISI) later. Both get the label of that ISI.
//!   Candidates that pair with nothing remain single events.
//! - **Repetitive** - trains of `pulse_num` pulses separated by more than the
//!   inter-train interval (ITI). Trains whose size differs from `pulse_num`
//!   are still emitted and reported as [`Diagnostic::CountMismatch`].
//!
//! # Example
//!
//! ```
//! use tms_pulse::detector::Candidate;
//! use tms_pulse::grouping::{group_pulses, GroupingMode, PairedConfig};
//!
//! let candidates = [
//!     Candidate { index: 1000, amplitude: 2000.0 },
//!     Candidate { index: 1020, amplitude: 2000.0 },
//!     Candidate { index: 4000, amplitude: 2000.0 },
//! ];
//! let paired = PairedConfig::new(vec![20.0], vec!["SICI".into()]);
//!
//! let grouping = group_pulses(&candidates, GroupingMode::Paired(&paired), "TMS", 1000.0).unwrap();
//! let labels: Vec<_> = grouping.pulses.iter().map(|p| (p.label.as_str(), p.index)).collect();
//!
//! assert_eq!(labels, vec![("SICI", 1000), ("SICI", 1020), ("TMS", 4000)]);
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::detector::Candidate;
use crate::error::{FindPulseError, Result};

/// Default matching tolerance around each ISI in milliseconds.
pub const DEFAULT_ISI_TOLERANCE_MS: f64 = 1.0;

fn default_isi_tolerance() -> f64 {
    DEFAULT_ISI_TOLERANCE_MS
}

/// Paired-pulse protocol.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairedConfig {
    /// Inter-stimulus intervals in milliseconds
    pub isi: Vec<f64>,
    /// One label per ISI
    pub pair_label: Vec<String>,
    /// Allowed deviation from an ISI in milliseconds (at least one sample period is used)
    #[serde(default = "default_isi_tolerance")]
    pub isi_tolerance_ms: f64,
}

impl PairedConfig {
    /// Creates a paired protocol with the default tolerance.
    pub fn new(isi: Vec<f64>, pair_label: Vec<String>) -> Self {
        Self {
            isi,
            pair_label,
            isi_tolerance_ms: DEFAULT_ISI_TOLERANCE_MS,
        }
    }

    /// Checks ISI values, label count and tolerance.
    pub fn validate(&self) -> Result<()> {
        if self.isi.is_empty() {
            return Err(FindPulseError::invalid("paired search needs at least one ISI"));
        }
        if let Some(bad) = self.isi.iter().find(|v| !v.is_finite() || **v <= 0.0) {
            return Err(FindPulseError::invalid(format!(
                "ISI values must be positive, got {bad}"
            )));
        }
        if self.pair_label.len() != self.isi.len() {
            return Err(FindPulseError::invalid(format!(
                "number of pair labels ({}) must match number of ISIs ({})",
                self.pair_label.len(),
                self.isi.len()
            )));
        }
        if !self.isi_tolerance_ms.is_finite() || self.isi_tolerance_ms < 0.0 {
            return Err(FindPulseError::invalid(format!(
                "ISI tolerance must be a non-negative number, got {}",
                self.isi_tolerance_ms
            )));
        }
        Ok(())
    }
}

/// Repetitive (train) protocol.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepetitiveConfig {
    /// Inter-train interval in milliseconds
    pub iti: f64,
    /// Expected pulses per train
    pub pulse_num: usize,
}

impl RepetitiveConfig {
    /// Checks ITI and pulse count.
    pub fn validate(&self) -> Result<()> {
        if !self.iti.is_finite() || self.iti <= 0.0 {
            return Err(FindPulseError::invalid(format!(
                "ITI must be positive, got {}",
                self.iti
            )));
        }
        if self.pulse_num == 0 {
            return Err(FindPulseError::invalid("pulse_num must be at least 1"));
        }
        Ok(())
    }
}

/// Selected grouping protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupingMode<'a> {
    /// Every candidate is a single pulse
    Single,
    /// Conditioning/test pairs
    Paired(&'a PairedConfig),
    /// Stimulation trains
    Repetitive(&'a RepetitiveConfig),
}

impl<'a> GroupingMode<'a> {
    /// Picks the mode from optional protocol settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if both protocols are given or the given one
    /// fails validation.
    pub fn from_options(
        paired: Option<&'a PairedConfig>,
        repetitive: Option<&'a RepetitiveConfig>,
    ) -> Result<Self> {
        match (paired, repetitive) {
            (Some(_), Some(_)) => Err(FindPulseError::invalid(
                "cannot search for both paired and repetitive stimuli",
            )),
            (Some(p), None) => {
                p.validate()?;
                Ok(GroupingMode::Paired(p))
            }
            (None, Some(r)) => {
                r.validate()?;
                Ok(GroupingMode::Repetitive(r))
            }
            (None, None) => Ok(GroupingMode::Single),
        }
    }
}

/// Role of a pulse within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseRole {
    /// Stand-alone pulse
    Single,
    /// First pulse of a pair
    Conditioning,
    /// Second pulse of a pair
    Test,
    /// Member of a repetitive train
    Train,
}

/// A labeled pulse ready to become an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledPulse {
    /// Event label
    pub label: String,
    /// Sample index
    pub index: usize,
    /// Position within its group
    pub role: PulseRole,
}

/// Pulses sharing one label and protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PulseGroup {
    /// Single pulses
    Single {
        /// Event label
        label: String,
        /// Pulse indices in order
        indices: Vec<usize>,
    },
    /// Conditioning/test pairs matched to one ISI
    Paired {
        /// Event label
        label: String,
        /// `(conditioning, test)` indices in order
        pairs: Vec<(usize, usize)>,
    },
    /// One stimulation train
    Train {
        /// Event label
        label: String,
        /// Contiguous pulse indices
        indices: Vec<usize>,
    },
}

impl PulseGroup {
    /// Label shared by every pulse in the group.
    pub fn label(&self) -> &str {
        match self {
            PulseGroup::Single { label, .. }
            | PulseGroup::Paired { label, .. }
            | PulseGroup::Train { label, .. } => label,
        }
    }

    /// Number of pulses in the group.
    pub fn pulse_count(&self) -> usize {
        match self {
            PulseGroup::Single { indices, .. } | PulseGroup::Train { indices, .. } => indices.len(),
            PulseGroup::Paired { pairs, .. } => 2 * pairs.len(),
        }
    }
}

/// Non-fatal conditions found while grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A train closed with a pulse count other than `pulse_num`
    CountMismatch {
        /// Sample index of the train's first pulse
        train_start: usize,
        /// Pulses found in the train
        observed: usize,
        /// Configured pulses per train
        expected: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CountMismatch {
                train_start,
                observed,
                expected,
            } => write!(
                f,
                "train starting at sample {train_start} has {observed} pulses, expected {expected}"
            ),
        }
    }
}

/// Output of the grouper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouping {
    /// Groups in protocol order
    pub groups: Vec<PulseGroup>,
    /// Every labeled pulse, ordered by sample index
    pub pulses: Vec<LabeledPulse>,
    /// Non-fatal findings
    pub diagnostics: Vec<Diagnostic>,
}

/// Labels `candidates` according to `mode`.
///
/// `sampling_rate` (Hz) converts sample gaps to milliseconds. The returned
/// pulses are ordered by sample index.
///
/// # Errors
///
/// Returns `InvalidConfig` if the protocol settings are invalid or the
/// candidate indices are not strictly increasing.
pub fn group_pulses(
    candidates: &[Candidate],
    mode: GroupingMode<'_>,
    tms_label: &str,
    sampling_rate: f64,
) -> Result<Grouping> {
    if let Some(w) = candidates.windows(2).find(|w| w[0].index >= w[1].index) {
        return Err(FindPulseError::invalid(format!(
            "candidate indices must be strictly increasing, got {} then {}",
            w[0].index, w[1].index
        )));
    }

    let grouping = match mode {
        GroupingMode::Single => group_single(candidates, tms_label),
        GroupingMode::Paired(cfg) => {
            cfg.validate()?;
            group_paired(candidates, cfg, tms_label, sampling_rate)
        }
        GroupingMode::Repetitive(cfg) => {
            cfg.validate()?;
            group_repetitive(candidates, cfg, tms_label, sampling_rate)
        }
    };

    for diagnostic in &grouping.diagnostics {
        warn!(%diagnostic, "pulse train count mismatch");
    }

    Ok(grouping)
}

fn group_single(candidates: &[Candidate], tms_label: &str) -> Grouping {
    let indices: Vec<usize> = candidates.iter().map(|c| c.index).collect();
    let pulses = indices
        .iter()
        .map(|&index| LabeledPulse {
            label: tms_label.to_string(),
            index,
            role: PulseRole::Single,
        })
        .collect();

    let groups = if indices.is_empty() {
        Vec::new()
    } else {
        vec![PulseGroup::Single {
            label: tms_label.to_string(),
            indices,
        }]
    };

    Grouping {
        groups,
        pulses,
        diagnostics: Vec::new(),
    }
}

/// Index of the ISI closest to `gap_ms` within `tolerance`. Earliest wins ties.
fn closest_isi(gap_ms: f64, isi: &[f64], tolerance: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (k, &interval) in isi.iter().enumerate() {
        let diff = (gap_ms - interval).abs();
        if diff <= tolerance && best.map_or(true, |(_, d)| diff < d) {
            best = Some((k, diff));
        }
    }
    best.map(|(k, _)| k)
}

fn group_paired(
    candidates: &[Candidate],
    cfg: &PairedConfig,
    tms_label: &str,
    sampling_rate: f64,
) -> Grouping {
    let ms_per_sample = 1000.0 / sampling_rate;
    let tolerance = cfg.isi_tolerance_ms.max(ms_per_sample);
    let max_gap = cfg.isi.iter().fold(0.0f64, |a, &b| a.max(b)) + tolerance;

    let mut used = vec![false; candidates.len()];
    let mut pairs: Vec<Vec<(usize, usize)>> = vec![Vec::new(); cfg.isi.len()];
    let mut singles = Vec::new();
    let mut pulses = Vec::with_capacity(candidates.len());

    for i in 0..candidates.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let conditioning = candidates[i].index;

        let mut matched = None;
        for j in (i + 1)..candidates.len() {
            let gap_ms = (candidates[j].index - conditioning) as f64 * ms_per_sample;
            if gap_ms > max_gap {
                break;
            }
            if used[j] {
                continue;
            }
            if let Some(k) = closest_isi(gap_ms, &cfg.isi, tolerance) {
                matched = Some((j, k));
                break;
            }
        }

        match matched {
            Some((j, k)) => {
                used[j] = true;
                let test = candidates[j].index;
                pairs[k].push((conditioning, test));
                let label = &cfg.pair_label[k];
                pulses.push(LabeledPulse {
                    label: label.clone(),
                    index: conditioning,
                    role: PulseRole::Conditioning,
                });
                pulses.push(LabeledPulse {
                    label: label.clone(),
                    index: test,
                    role: PulseRole::Test,
                });
            }
            None => {
                singles.push(conditioning);
                pulses.push(LabeledPulse {
                    label: tms_label.to_string(),
                    index: conditioning,
                    role: PulseRole::Single,
                });
            }
        }
    }

    pulses.sort_by_key(|p| p.index);

    let mut groups: Vec<PulseGroup> = pairs
        .into_iter()
        .zip(cfg.pair_label.iter())
        .filter(|(p, _)| !p.is_empty())
        .map(|(pairs, label)| PulseGroup::Paired {
            label: label.clone(),
            pairs,
        })
        .collect();
    if !singles.is_empty() {
        groups.push(PulseGroup::Single {
            label: tms_label.to_string(),
            indices: singles,
        });
    }

    Grouping {
        groups,
        pulses,
        diagnostics: Vec::new(),
    }
}

fn group_repetitive(
    candidates: &[Candidate],
    cfg: &RepetitiveConfig,
    tms_label: &str,
    sampling_rate: f64,
) -> Grouping {
    let iti_samples = cfg.iti * sampling_rate / 1000.0;
    let mut grouping = Grouping::default();
    let mut current: Vec<usize> = Vec::with_capacity(cfg.pulse_num);

    let close = |train: &mut Vec<usize>, grouping: &mut Grouping| {
        if train.is_empty() {
            return;
        }
        if train.len() != cfg.pulse_num {
            grouping.diagnostics.push(Diagnostic::CountMismatch {
                train_start: train[0],
                observed: train.len(),
                expected: cfg.pulse_num,
            });
        }
        grouping.pulses.extend(train.iter().map(|&index| LabeledPulse {
            label: tms_label.to_string(),
            index,
            role: PulseRole::Train,
        }));
        grouping.groups.push(PulseGroup::Train {
            label: tms_label.to_string(),
            indices: core::mem::take(train),
        });
    };

    for candidate in candidates {
        if let Some(&last) = current.last() {
            if (candidate.index - last) as f64 > iti_samples {
                close(&mut current, &mut grouping);
            }
        }
        current.push(candidate.index);
        if current.len() == cfg.pulse_num {
            close(&mut current, &mut grouping);
        }
    }
    close(&mut current, &mut grouping);

    grouping
}

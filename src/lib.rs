//! Detection and labeling of TMS pulse artifacts in continuous EEG.
//!
//! A transcranial magnetic stimulation discharge leaves a brief,
//! high-amplitude deflection on every EEG channel. This crate finds those
//! deflections on one reference channel and turns them into labeled events:
//! single pulses, conditioning/test pairs, or members of repetitive trains.
//!
//! The stages can be used on their own or chained with [`PulseFinder`]:
//!
//! 1. [`detrend`](detrend::detrend) removes slow drift
//! 2. [`compute_thresholds`](threshold::compute_thresholds) resolves the
//!    artifact-range thresholds
//! 3. [`Membership`](polarity::Membership) decides which samples count
//! 4. [`detect_peaks`](detector::detect_peaks) yields one candidate per discharge
//! 5. [`group_pulses`](grouping::group_pulses) labels candidates by protocol
//! 6. [`annotate`](annotate::annotate) appends events to the host recording
//!
//! # Example
//!
//! ```
//! use tms_pulse::{FindPulseConfig, PulseFinder, Recording};
//!
//! let mut samples = vec![0.0; 5000];
//! samples[1000] = 2000.0;
//! samples[1020] = 2000.0;
//!
//! let config = FindPulseConfig::from_toml_str(r#"
//!     thrshtype = 1000
//!
//!     [paired]
//!     isi = [20.0]
//!     pair_label = ["SICI"]
//! "#).unwrap();
//!
//! let mut recording = Recording::new(1000.0).unwrap();
//! recording.add_channel("Cz", samples).unwrap();
//!
//! PulseFinder::new(config).unwrap().annotate_recording(&mut recording).unwrap();
//!
//! let latencies: Vec<_> = recording.events().iter().map(|e| e.latency).collect();
//! assert_eq!(latencies, vec![1000, 1020]);
//! ```

pub mod annotate;
pub mod config;
pub mod detector;
pub mod detrend;
pub mod error;
pub mod grouping;
pub mod linalg;
pub mod percentile;
pub mod pipeline;
pub mod polarity;
pub mod threshold;
pub mod trace;

pub use annotate::{EventHost, EventRecord, Recording};
pub use config::FindPulseConfig;
pub use detector::Candidate;
pub use detrend::DetrendMode;
pub use error::{FindPulseError, Result};
pub use grouping::{Diagnostic, LabeledPulse, PulseGroup};
pub use pipeline::{Detection, PulseFinder};
pub use polarity::{Boundary, PiecewiseBoundary, Polarity};
pub use threshold::{ThresholdSpec, Thresholds};
pub use trace::Trace;

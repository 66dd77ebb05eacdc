//! Event annotation: writing labeled pulses into the host recording.
//!
//! This is the only stage with an effect outside the pure computation. The
//! host side is the [`EventHost`] trait; [`Recording`] is a minimal
//! in-memory host holding named channels and an event list.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FindPulseError, Result};
use crate::grouping::LabeledPulse;
use crate::trace::Trace;

/// A labeled event appended to the host's event list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event label
    #[serde(rename = "type")]
    pub event_type: String,
    /// Sample index of the event
    pub latency: usize,
}

impl EventRecord {
    /// Creates an event.
    pub fn new(event_type: impl Into<String>, latency: usize) -> Self {
        Self {
            event_type: event_type.into(),
            latency,
        }
    }

    /// Latency in milliseconds from the start of the recording.
    pub fn latency_ms(&self, sampling_rate: f64) -> f64 {
        self.latency as f64 * 1000.0 / sampling_rate
    }
}

/// Receiver of new events, implemented by the host recording.
pub trait EventHost {
    /// Appends events in the given order.
    fn append_events(&mut self, events: Vec<EventRecord>);
}

impl EventHost for Vec<EventRecord> {
    fn append_events(&mut self, events: Vec<EventRecord>) {
        self.extend(events);
    }
}

/// Converts labeled pulses into event records without touching any host.
///
/// # Errors
///
/// Returns `InvalidConfig` if a pulse index is outside `0..trace_len`.
pub fn to_event_records(pulses: &[LabeledPulse], trace_len: usize) -> Result<Vec<EventRecord>> {
    if let Some(p) = pulses.iter().find(|p| p.index >= trace_len) {
        return Err(FindPulseError::invalid(format!(
            "event latency {} is outside a trace of {trace_len} samples",
            p.index
        )));
    }

    Ok(pulses
        .iter()
        .map(|p| EventRecord::new(p.label.clone(), p.index))
        .collect())
}

/// Appends one event per pulse to `host` and returns the number appended.
///
/// All latencies are checked before the host is touched, so on error the
/// host is left unchanged.
///
/// # Example
///
/// ```
/// use tms_pulse::annotate::{annotate, EventRecord};
/// use tms_pulse::grouping::{LabeledPulse, PulseRole};
///
/// let pulses = vec![LabeledPulse { label: "TMS".into(), index: 5000, role: PulseRole::Single }];
/// let mut events: Vec<EventRecord> = Vec::new();
///
/// assert_eq!(annotate(&mut events, &pulses, 10_000).unwrap(), 1);
/// assert_eq!(events, vec![EventRecord::new("TMS", 5000)]);
/// ```
pub fn annotate<H>(host: &mut H, pulses: &[LabeledPulse], trace_len: usize) -> Result<usize>
where
    H: EventHost + ?Sized,
{
    let records = to_event_records(pulses, trace_len)?;
    let count = records.len();
    host.append_events(records);
    debug!(count, "appended events");
    Ok(count)
}

/// A minimal host recording: equally long named channels plus an event list.
///
/// # Example
///
/// ```
/// use tms_pulse::Recording;
///
/// let mut recording = Recording::new(1000.0).unwrap();
/// recording.add_channel("Cz", vec![0.0; 2000]).unwrap();
///
/// let trace = recording.channel("Cz").unwrap();
/// assert_eq!(trace.len(), 2000);
/// assert!(recording.channel("Fz").is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    sampling_rate: f64,
    channels: Vec<(String, Vec<f64>)>,
    events: Vec<EventRecord>,
}

impl Recording {
    /// Creates an empty recording sampled at `sampling_rate` Hz.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the sampling rate is not finite and positive.
    pub fn new(sampling_rate: f64) -> Result<Self> {
        Trace::new(&[], sampling_rate)?;
        Ok(Self {
            sampling_rate,
            channels: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Adds a channel.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the label is taken or the length differs
    /// from the existing channels.
    pub fn add_channel(&mut self, label: impl Into<String>, samples: Vec<f64>) -> Result<()> {
        let label = label.into();
        if self.channels.iter().any(|(l, _)| *l == label) {
            return Err(FindPulseError::invalid(format!(
                "channel '{label}' already exists"
            )));
        }
        if let Some((_, first)) = self.channels.first() {
            if first.len() != samples.len() {
                return Err(FindPulseError::invalid(format!(
                    "channel '{label}' has {} samples, recording has {}",
                    samples.len(),
                    first.len()
                )));
            }
        }
        self.channels.push((label, samples));
        Ok(())
    }

    /// Returns the channel with `label` as a trace.
    pub fn channel(&self, label: &str) -> Option<Trace<'_>> {
        self.channels
            .iter()
            .find(|(l, _)| l == label)
            .and_then(|(_, samples)| Trace::new(samples, self.sampling_rate).ok())
    }

    /// Channel labels in insertion order.
    pub fn channel_labels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|(l, _)| l.as_str())
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }
}

impl EventHost for Recording {
    fn append_events(&mut self, events: Vec<EventRecord>) {
        self.events.extend(events);
    }
}

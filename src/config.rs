//! Per-invocation configuration.
//!
//! A [`FindPulseConfig`] is built once, validated, and then only read. It is
//! normally loaded from TOML:
//!
//! ```
//! use tms_pulse::config::FindPulseConfig;
//! use tms_pulse::detrend::DetrendMode;
//! use tms_pulse::threshold::ThresholdSpec;
//!
//! let config = FindPulseConfig::from_toml_str(r#"
//!     dtrend = "linear"
//!     thrshtype = 1500
//!
//!     [paired]
//!     isi = [3.0]
//!     pair_label = ["SICI"]
//! "#).unwrap();
//!
//! assert_eq!(config.dtrend, DetrendMode::Linear);
//! assert_eq!(config.thrshtype, ThresholdSpec::Manual(1500.0));
//! assert_eq!(config.tms_label, "TMS");
//! ```

use serde::Deserialize;

use crate::detrend::DetrendMode;
use crate::error::{FindPulseError, Result};
use crate::grouping::{GroupingMode, PairedConfig, RepetitiveConfig};
use crate::polarity::{PiecewiseBoundary, Polarity};
use crate::threshold::ThresholdSpec;

/// Default label for single pulses and train members.
pub const DEFAULT_TMS_LABEL: &str = "TMS";

fn default_tms_label() -> String {
    DEFAULT_TMS_LABEL.to_string()
}

/// Operator-drawn boundary as bend points `[sample_index, value]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryConfig {
    /// Upper curve
    pub upper: Vec<(usize, f64)>,
    /// Lower curve
    pub lower: Vec<(usize, f64)>,
}

/// Pulse-finding options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindPulseConfig {
    /// Detrending applied before thresholding
    #[serde(default)]
    pub dtrend: DetrendMode,
    /// Threshold policy
    #[serde(default)]
    pub thrshtype: ThresholdSpec,
    /// Which excursions count as pulses
    #[serde(default)]
    pub wpeaks: Polarity,
    /// Label for single pulses and train members
    #[serde(default = "default_tms_label")]
    pub tms_label: String,
    /// Gap in milliseconds below which adjacent runs merge into one discharge
    #[serde(default)]
    pub refractory_ms: f64,
    /// Channel of the host recording to analyse
    #[serde(default)]
    pub channel: Option<String>,
    /// Paired-pulse protocol
    #[serde(default)]
    pub paired: Option<PairedConfig>,
    /// Repetitive protocol
    #[serde(default)]
    pub repetitive: Option<RepetitiveConfig>,
    /// Boundary for interactive polarity
    #[serde(default)]
    pub boundary: Option<BoundaryConfig>,
}

impl Default for FindPulseConfig {
    fn default() -> Self {
        Self {
            dtrend: DetrendMode::default(),
            thrshtype: ThresholdSpec::default(),
            wpeaks: Polarity::default(),
            tms_label: default_tms_label(),
            refractory_ms: 0.0,
            channel: None,
            paired: None,
            repetitive: None,
            boundary: None,
        }
    }
}

impl FindPulseConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on syntax errors, unknown keys, bad values,
    /// or contradictory options.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| FindPulseError::invalid(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.tms_label.is_empty() {
            return Err(FindPulseError::invalid("tms_label must not be empty"));
        }
        if !self.refractory_ms.is_finite() || self.refractory_ms < 0.0 {
            return Err(FindPulseError::invalid(format!(
                "refractory_ms must be a non-negative number, got {}",
                self.refractory_ms
            )));
        }
        if let ThresholdSpec::Manual(v) = self.thrshtype {
            ThresholdSpec::manual(v)?;
        }
        self.grouping_mode()?;
        self.boundary()?;
        Ok(())
    }

    /// Grouping mode selected by the `paired` / `repetitive` sections.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if both are present or either is invalid.
    pub fn grouping_mode(&self) -> Result<GroupingMode<'_>> {
        GroupingMode::from_options(self.paired.as_ref(), self.repetitive.as_ref())
    }

    /// Boundary built from the `boundary` section, if any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the bend points are invalid.
    pub fn boundary(&self) -> Result<Option<PiecewiseBoundary>> {
        self.boundary
            .as_ref()
            .map(|b| PiecewiseBoundary::new(b.upper.clone(), b.lower.clone()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polarity::Boundary;

    #[test]
    fn test_defaults() {
        let config = FindPulseConfig::from_toml_str("").unwrap();
        assert_eq!(config, FindPulseConfig::default());
        assert_eq!(config.dtrend, DetrendMode::Poly);
        assert_eq!(config.thrshtype, ThresholdSpec::Dynamic);
        assert_eq!(config.wpeaks, Polarity::Positive);
        assert_eq!(config.grouping_mode().unwrap(), GroupingMode::Single);
    }

    #[test]
    fn test_full_document() {
        let config = FindPulseConfig::from_toml_str(
            r#"
            dtrend = "off"
            thrshtype = "median"
            wpeaks = "interactive"
            tms_label = "pulse"
            refractory_ms = 2.5
            channel = "Cz"

            [repetitive]
            iti = 2600.0
            pulse_num = 40

            [boundary]
            upper = [[0, 500.0], [1000, 900.0]]
            lower = [[0, -500.0]]
            "#,
        )
        .unwrap();

        assert_eq!(config.dtrend, DetrendMode::Off);
        assert_eq!(config.thrshtype, ThresholdSpec::Median);
        assert_eq!(config.wpeaks, Polarity::Interactive);
        assert_eq!(config.channel.as_deref(), Some("Cz"));
        assert!(matches!(
            config.grouping_mode().unwrap(),
            GroupingMode::Repetitive(r) if r.pulse_num == 40
        ));

        let boundary = config.boundary().unwrap().unwrap();
        assert_eq!(boundary.bounds(500), (700.0, -500.0));
    }

    #[test]
    fn test_paired_tolerance_default() {
        let config = FindPulseConfig::from_toml_str(
            r#"
            [paired]
            isi = [3.0, 100.0]
            pair_label = ["SICI", "LICI"]
            "#,
        )
        .unwrap();

        let paired = config.paired.unwrap();
        assert_eq!(paired.isi_tolerance_ms, 1.0);
        assert_eq!(paired.pair_label, vec!["SICI", "LICI"]);
    }

    #[test]
    fn test_paired_and_repetitive_rejected() {
        let result = FindPulseConfig::from_toml_str(
            r#"
            [paired]
            isi = [3.0]
            pair_label = ["SICI"]

            [repetitive]
            iti = 2600.0
            pulse_num = 40
            "#,
        );
        assert!(matches!(result, Err(FindPulseError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_values_rejected() {
        for text in [
            "dtrend = \"cubic\"",
            "thrshtype = \"peaky\"",
            "wpeaks = \"both\"",
            "refractory_ms = -1.0",
            "tms_label = \"\"",
            "unknown_key = 1",
            "[paired]\nisi = [3.0]\npair_label = []",
            "[boundary]\nupper = []\nlower = [[0, -1.0]]",
            "dtrend = ",
        ] {
            assert!(
                matches!(
                    FindPulseConfig::from_toml_str(text),
                    Err(FindPulseError::InvalidConfig(_))
                ),
                "accepted: {text}"
            );
        }
    }
}

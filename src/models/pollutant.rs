//! Pollutant taxonomy and per-pollutant readings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The fixed set of pollutants every provider is normalized into.
///
/// Declaration order is significant: ordered maps keyed by `Pollutant`
/// iterate in this order, which makes primary-pollutant tie-breaking stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    Pm10,
    No2,
    O3,
    Co,
    So2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::O3,
        Pollutant::Co,
        Pollutant::So2,
    ];

    /// Short machine name used in reports ("pm25", "o3", ...)
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::No2 => "no2",
            Pollutant::O3 => "o3",
            Pollutant::Co => "co",
            Pollutant::So2 => "so2",
        }
    }

    /// Molecular weight in g/mol for gas-phase pollutants
    #[must_use]
    pub fn molecular_weight(&self) -> Option<f64> {
        match self {
            Pollutant::No2 => Some(46.01),
            Pollutant::O3 => Some(48.00),
            Pollutant::Co => Some(28.01),
            Pollutant::So2 => Some(64.07),
            Pollutant::Pm25 | Pollutant::Pm10 => None,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returned when a provider names a parameter outside the taxonomy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized pollutant '{0}'")]
pub struct UnrecognizedPollutant(pub String);

impl FromStr for Pollutant {
    type Err = UnrecognizedPollutant;

    /// Accepts the spellings used by the upstream networks
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '.' | '_' | ' ' | '-'))
            .collect();

        match normalized.as_str() {
            "pm25" => Ok(Pollutant::Pm25),
            "pm10" => Ok(Pollutant::Pm10),
            "no2" => Ok(Pollutant::No2),
            "o3" | "ozone" => Ok(Pollutant::O3),
            "co" => Ok(Pollutant::Co),
            "so2" => Ok(Pollutant::So2),
            _ => Err(UnrecognizedPollutant(s.to_string())),
        }
    }
}

/// Concentration unit as reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    /// Canonical unit for every breakpoint table
    MicrogramsPerCubicMeter,
    PartsPerMillion,
    PartsPerBillion,
    /// Provider did not say, or used a label we do not know; taken as canonical
    Unspecified,
}

impl Unit {
    /// Parse the free-text unit labels found in provider payloads
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "µg/m³" | "μg/m³" | "ug/m3" | "µg/m3" | "ug/m³" => Unit::MicrogramsPerCubicMeter,
            "ppm" => Unit::PartsPerMillion,
            "ppb" => Unit::PartsPerBillion,
            _ => Unit::Unspecified,
        }
    }
}

/// One pollutant's value within an observation.
///
/// `concentration` is `None` when the pollutant slot exists but no source
/// reported a value; `Some(0.0)` means a measured zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollutantReading {
    pub pollutant: Pollutant,
    pub concentration: Option<f64>,
    pub unit: Unit,
}

impl PollutantReading {
    /// Reading already expressed in the canonical unit
    #[must_use]
    pub fn canonical(pollutant: Pollutant, concentration: f64) -> Self {
        Self {
            pollutant,
            concentration: Some(concentration),
            unit: Unit::MicrogramsPerCubicMeter,
        }
    }

    #[must_use]
    pub fn missing(pollutant: Pollutant) -> Self {
        Self {
            pollutant,
            concentration: None,
            unit: Unit::MicrogramsPerCubicMeter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("pm25", Pollutant::Pm25)]
    #[case("PM2.5", Pollutant::Pm25)]
    #[case("pm2_5", Pollutant::Pm25)]
    #[case("PM10", Pollutant::Pm10)]
    #[case("OZONE", Pollutant::O3)]
    #[case("o3", Pollutant::O3)]
    #[case("NO2", Pollutant::No2)]
    #[case("co", Pollutant::Co)]
    #[case("so2", Pollutant::So2)]
    fn test_pollutant_aliases(#[case] input: &str, #[case] expected: Pollutant) {
        assert_eq!(input.parse::<Pollutant>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_pollutant() {
        assert!("temperature".parse::<Pollutant>().is_err());

        let err = "nh3".parse::<Pollutant>().unwrap_err();
        assert_eq!(err, UnrecognizedPollutant("nh3".to_string()));
        assert_eq!(err.to_string(), "unrecognized pollutant 'nh3'");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_ordering_follows_declaration() {
        let mut kinds = vec![Pollutant::So2, Pollutant::O3, Pollutant::Pm25];
        kinds.sort();
        assert_eq!(kinds, vec![Pollutant::Pm25, Pollutant::O3, Pollutant::So2]);
    }

    #[test]
    fn test_unit_labels() {
        assert_eq!(Unit::from_label("µg/m³"), Unit::MicrogramsPerCubicMeter);
        assert_eq!(Unit::from_label("ug/m3"), Unit::MicrogramsPerCubicMeter);
        assert_eq!(Unit::from_label("PPM"), Unit::PartsPerMillion);
        assert_eq!(Unit::from_label("ppb"), Unit::PartsPerBillion);
        assert_eq!(Unit::from_label("particles/cm³"), Unit::Unspecified);
    }
}

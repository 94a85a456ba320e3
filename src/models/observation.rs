//! Observation model: one point-in-time picture of air quality at a coordinate

use super::{Coordinate, Pollutant, PollutantReading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Weather conditions reported alongside pollutant readings
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct WeatherSnapshot {
    /// Temperature in Celsius
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    pub humidity: Option<f64>,
    /// Atmospheric pressure in hPa
    pub pressure: Option<f64>,
    /// Wind speed in m/s
    pub wind_speed: Option<f64>,
    /// Wind direction in degrees (0-360, where 0/360 is North)
    pub wind_direction: Option<f64>,
}

impl WeatherSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.humidity.is_none()
            && self.pressure.is_none()
            && self.wind_speed.is_none()
            && self.wind_direction.is_none()
    }
}

/// How trustworthy the numbers in an observation are
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceKind {
    /// Direct concentration measurements
    Measured,
    /// Concentrations reverse-mapped from an index or taken from a nominal product
    Estimated,
    /// Generated locally because no provider answered
    Synthetic,
}

/// Which provider(s) produced an observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub label: String,
    pub kind: ProvenanceKind,
}

impl Provenance {
    pub fn measured<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            kind: ProvenanceKind::Measured,
        }
    }

    pub fn estimated<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            kind: ProvenanceKind::Estimated,
        }
    }

    pub fn synthetic<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            kind: ProvenanceKind::Synthetic,
        }
    }

    /// Combined label "<primary> + <supplementary>"; the weaker kind wins
    #[must_use]
    pub fn combine(&self, supplementary: &Provenance) -> Self {
        Self {
            label: format!("{} + {}", self.label, supplementary.label),
            kind: self.kind.max(supplementary.kind),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Normalized air quality observation.
///
/// All readings are in the canonical unit (µg/m³) once an observation has
/// been built by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
    pub readings: BTreeMap<Pollutant, PollutantReading>,
    pub weather: Option<WeatherSnapshot>,
    pub provenance: Provenance,
}

impl Observation {
    #[must_use]
    pub fn new(coordinate: Coordinate, timestamp: DateTime<Utc>, provenance: Provenance) -> Self {
        Self {
            coordinate,
            timestamp,
            readings: BTreeMap::new(),
            weather: None,
            provenance,
        }
    }

    /// Builder-style helper for adding a canonical reading
    #[must_use]
    pub fn with_reading(mut self, pollutant: Pollutant, concentration: f64) -> Self {
        self.readings
            .insert(pollutant, PollutantReading::canonical(pollutant, concentration));
        self
    }

    #[must_use]
    pub fn with_weather(mut self, weather: WeatherSnapshot) -> Self {
        self.weather = if weather.is_empty() { None } else { Some(weather) };
        self
    }

    /// Concentration for a pollutant, if any source reported one
    #[must_use]
    pub fn concentration(&self, pollutant: Pollutant) -> Option<f64> {
        self.readings
            .get(&pollutant)
            .and_then(|reading| reading.concentration)
    }

    /// Pollutant concentrations in taxonomy order, absent values included as `None`
    pub fn concentrations(&self) -> impl Iterator<Item = (Pollutant, Option<f64>)> + '_ {
        self.readings
            .iter()
            .map(|(pollutant, reading)| (*pollutant, reading.concentration))
    }

    /// An observation is usable once at least one pollutant has a value
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.readings
            .values()
            .any(|reading| reading.concentration.is_some())
    }

    /// Fill pollutant slots that are still empty from a supplementary source.
    ///
    /// Measured values already present are never overwritten. Returns the
    /// number of slots filled; provenance is only combined when that is non-zero.
    pub fn fill_gaps_from(&mut self, supplementary: &Observation) -> usize {
        let mut filled = 0;
        for (pollutant, reading) in &supplementary.readings {
            if reading.concentration.is_none() || self.concentration(*pollutant).is_some() {
                continue;
            }
            self.readings.insert(*pollutant, *reading);
            filled += 1;
        }

        if filled > 0 {
            self.provenance = self.provenance.combine(&supplementary.provenance);
        }
        filled
    }
}

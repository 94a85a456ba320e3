//! Deterministic placeholder observations for when no provider answers.
//!
//! Values are smooth, bounded functions of the coordinate: the same point
//! always yields the same numbers and nearby points vary gradually.

use crate::models::{Coordinate, Observation, Pollutant, Provenance, WeatherSnapshot};
use chrono::{DateTime, Utc};

pub const SYNTHETIC_SOURCE: &str = "Synthetic estimate (no provider data)";

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `low + span * (0.5 + 0.5 * wave)` for a wave in [-1, 1]
fn band(low: f64, span: f64, wave: f64) -> f64 {
    low + span * (0.5 + 0.5 * wave)
}

/// Pollutant baselines in µg/m³
fn pollutants(lat: f64, lon: f64) -> [(Pollutant, f64); 4] {
    [
        (Pollutant::Pm25, band(10.0, 35.0, (lat * 0.21 + lon * 0.13).sin())),
        (Pollutant::Pm10, band(25.0, 45.0, (lat * 0.17 - lon * 0.11).cos())),
        (Pollutant::No2, band(15.0, 30.0, (lat * 0.27 + lon * 0.19).sin())),
        (Pollutant::O3, band(45.0, 40.0, (lat * 0.12 + lon * 0.23).cos())),
    ]
}

fn weather(lat: f64, lon: f64) -> WeatherSnapshot {
    WeatherSnapshot {
        temperature: Some(round_to(band(15.0, 25.0, (lat * 0.08).cos()), 1)),
        humidity: Some(round_to(band(40.0, 40.0, (lon * 0.12).sin()), 1)),
        pressure: Some(round_to(band(1000.0, 50.0, (lat * 0.05 + lon * 0.07).sin()), 2)),
        wind_speed: Some(round_to(band(3.0, 8.0, (lat * 0.11 - lon * 0.09).cos()), 1)),
        wind_direction: Some(round_to(band(0.0, 359.9, (lat * 0.07 + lon * 0.05).sin()), 1)),
    }
}

/// Build the synthetic observation for a coordinate
#[must_use]
pub fn synthesize(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Observation {
    let (lat, lon) = (coordinate.latitude, coordinate.longitude);
    let label = format!(
        "{} - Location: {:.2}, {:.2}",
        SYNTHETIC_SOURCE, lat, lon
    );

    pollutants(lat, lon).into_iter().fold(
        Observation::new(coordinate, timestamp, Provenance::synthetic(label))
            .with_weather(weather(lat, lon)),
        |observation, (pollutant, value)| observation.with_reading(pollutant, round_to(value, 1)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProvenanceKind;

    fn at(lat: f64, lon: f64) -> Observation {
        synthesize(Coordinate::new(lat, lon).unwrap(), Utc::now())
    }

    #[test]
    fn test_deterministic_per_coordinate() {
        let first = at(34.05, -118.24);
        let second = at(34.05, -118.24);
        assert_eq!(first.readings, second.readings);
        assert_eq!(first.weather, second.weather);
        assert_eq!(first.provenance, second.provenance);
        assert_eq!(first.provenance.kind, ProvenanceKind::Synthetic);
        assert_eq!(
            first.provenance.label,
            "Synthetic estimate (no provider data) - Location: 34.05, -118.24"
        );
    }

    #[test]
    fn test_location_sensitive() {
        let los_angeles = at(34.05, -118.24);
        let new_york = at(40.71, -74.01);
        assert_ne!(los_angeles.readings, new_york.readings);
        assert_ne!(los_angeles.weather, new_york.weather);
    }

    #[test]
    fn test_values_are_bounded() {
        for lat in (-90..=90).step_by(15) {
            for lon in (-180..=180).step_by(20) {
                let observation = at(f64::from(lat), f64::from(lon));
                assert_eq!(observation.readings.len(), 4);
                for (pollutant, value) in observation.concentrations() {
                    let value = value.unwrap();
                    assert!(value > 0.0 && value <= 85.0, "{pollutant} = {value}");
                }
                let weather = observation.weather.unwrap();
                let direction = weather.wind_direction.unwrap();
                assert!((0.0..360.0).contains(&direction));
                let humidity = weather.humidity.unwrap();
                assert!((40.0..=80.0).contains(&humidity));
            }
        }
    }
}

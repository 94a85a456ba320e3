//! Unit normalization into the canonical µg/m³ expected by the breakpoint tables

use crate::models::{Pollutant, PollutantReading, Unit};
use thiserror::Error;

/// Molar volume of an ideal gas in L/mol at 25°C and 1 atm
pub const MOLAR_VOLUME_LITERS: f64 = 24.45;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("Negative concentration {value} for {pollutant}")]
    Negative { pollutant: Pollutant, value: f64 },

    #[error("Non-finite concentration for {pollutant}")]
    NonFinite { pollutant: Pollutant },
}

/// Convert a gas mixing ratio in ppm to µg/m³
#[must_use]
pub fn ppm_to_micrograms(ppm: f64, molecular_weight: f64) -> f64 {
    ppm * molecular_weight * 1000.0 / MOLAR_VOLUME_LITERS
}

/// Convert a provider value into the canonical unit.
///
/// Mixing ratios are only converted for gases; particulates reported in a
/// mixing-ratio unit and unlabeled values pass through unchanged.
pub fn normalize(pollutant: Pollutant, value: f64, unit: Unit) -> Result<f64, NormalizeError> {
    if !value.is_finite() {
        return Err(NormalizeError::NonFinite { pollutant });
    }
    if value < 0.0 {
        return Err(NormalizeError::Negative { pollutant, value });
    }

    let converted = match (unit, pollutant.molecular_weight()) {
        (Unit::PartsPerMillion, Some(weight)) => ppm_to_micrograms(value, weight),
        (Unit::PartsPerBillion, Some(weight)) => ppm_to_micrograms(value / 1000.0, weight),
        _ => value,
    };

    Ok(converted)
}

/// Normalize a raw provider value into a canonical reading
pub fn normalized_reading(
    pollutant: Pollutant,
    value: f64,
    unit: Unit,
) -> Result<PollutantReading, NormalizeError> {
    normalize(pollutant, value, unit)
        .map(|concentration| PollutantReading::canonical(pollutant, concentration))
}

/// Approximate PM2.5 (µg/m³) from an AirVisual US-AQI figure.
///
/// AirVisual's free tier only publishes the index, so this inverts it with
/// coarse linear bands. The mapping is lossy; readings produced this way must
/// be tagged as estimated.
#[must_use]
pub fn airvisual_aqi_to_pm25(aqi: f64) -> f64 {
    let aqi = aqi.max(0.0);
    let pm25 = if aqi <= 50.0 {
        aqi * 0.5
    } else if aqi <= 100.0 {
        25.0 + (aqi - 50.0) * 0.5
    } else if aqi <= 150.0 {
        50.0 + (aqi - 100.0) * 0.8
    } else {
        90.0 + (aqi - 150.0) * 1.2
    };
    (pm25 * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[rstest]
    #[case(Pollutant::No2, 46.01)]
    #[case(Pollutant::O3, 48.00)]
    #[case(Pollutant::Co, 28.01)]
    #[case(Pollutant::So2, 64.07)]
    fn test_ppm_conversion(#[case] pollutant: Pollutant, #[case] weight: f64) {
        let value = normalize(pollutant, 1.0, Unit::PartsPerMillion).unwrap();
        assert!(approx(value, weight * 1000.0 / 24.45));
    }

    #[test]
    fn test_no2_ppm_value() {
        let value = normalize(Pollutant::No2, 0.05, Unit::PartsPerMillion).unwrap();
        assert!(approx(value, 94.089_979_550_102_25));
    }

    #[test]
    fn test_ppb_is_thousandth_of_ppm() {
        let ppb = normalize(Pollutant::O3, 50.0, Unit::PartsPerBillion).unwrap();
        let ppm = normalize(Pollutant::O3, 0.05, Unit::PartsPerMillion).unwrap();
        assert!(approx(ppb, ppm));
    }

    #[test]
    fn test_particulates_pass_through() {
        assert_eq!(normalize(Pollutant::Pm25, 12.5, Unit::PartsPerMillion).unwrap(), 12.5);
        assert_eq!(
            normalize(Pollutant::Pm10, 40.0, Unit::MicrogramsPerCubicMeter).unwrap(),
            40.0
        );
        assert_eq!(normalize(Pollutant::No2, 20.0, Unit::Unspecified).unwrap(), 20.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            normalize(Pollutant::Pm25, -1.0, Unit::MicrogramsPerCubicMeter),
            Err(NormalizeError::Negative { .. })
        ));
        assert!(matches!(
            normalize(Pollutant::Pm25, f64::INFINITY, Unit::MicrogramsPerCubicMeter),
            Err(NormalizeError::NonFinite { .. })
        ));
        assert!(normalize(Pollutant::Pm25, 0.0, Unit::MicrogramsPerCubicMeter).is_ok());
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(42.0, 21.0)]
    #[case(50.0, 25.0)]
    #[case(80.0, 40.0)]
    #[case(120.0, 66.0)]
    #[case(200.0, 150.0)]
    fn test_airvisual_bands(#[case] aqi: f64, #[case] expected: f64) {
        assert!(approx(airvisual_aqi_to_pm25(aqi), expected));
    }
}

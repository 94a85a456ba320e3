//! Forecast projection
//!
//! Not a physical model: each point perturbs the baseline's latest values by
//! a factor in [0.8, 1.2] and drifts the weather by fixed per-hour
//! increments. Perturbations come from an RNG seeded by (coordinate, offset),
//! so a point never depends on the requested horizon.

use crate::aqi::AqiResult;
use crate::models::{
    Coordinate, DailyAggregate, Observation, Pollutant, Provenance, ProvenanceKind, WeatherSnapshot,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use std::collections::BTreeMap;

/// Hours between consecutive points
pub const STEP_HOURS: u32 = 6;

/// Longest horizon accepted by the service
pub const MAX_HORIZON_HOURS: u32 = 168;

const PERTURBATION_LOW: f64 = 0.8;
const PERTURBATION_HIGH: f64 = 1.2;

/// Starting weather when the baseline carries none
pub const DEFAULT_WEATHER: WeatherSnapshot = WeatherSnapshot {
    temperature: Some(22.5),
    humidity: Some(65.0),
    pressure: Some(1013.25),
    wind_speed: Some(5.2),
    wind_direction: Some(180.0),
};

/// Per-hour weather increments
const TEMPERATURE_DRIFT: f64 = 0.1;
const HUMIDITY_DRIFT: f64 = -0.2;
const PRESSURE_DRIFT: f64 = 0.1;
const WIND_SPEED_DRIFT: f64 = 0.05;
const WIND_DIRECTION_DRIFT: f64 = 2.0;

/// What a forecast is projected from
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastBaseline {
    /// Daily means, oldest first
    History(Vec<DailyAggregate>),
    /// A single observation, typically the synthetic one
    Observation(Observation),
}

impl ForecastBaseline {
    /// Latest known value of each pollutant
    #[must_use]
    pub fn latest_values(&self) -> BTreeMap<Pollutant, f64> {
        match self {
            ForecastBaseline::History(days) => {
                let mut latest = BTreeMap::new();
                for day in days {
                    latest.extend(day.means.iter().map(|(p, v)| (*p, *v)));
                }
                latest
            }
            ForecastBaseline::Observation(observation) => observation
                .concentrations()
                .filter_map(|(pollutant, value)| Some((pollutant, value?)))
                .collect(),
        }
    }

    /// Weather to drift from, field by field falling back to [`DEFAULT_WEATHER`]
    #[must_use]
    pub fn starting_weather(&self) -> WeatherSnapshot {
        let observed = match self {
            ForecastBaseline::History(_) => None,
            ForecastBaseline::Observation(observation) => observation.weather,
        }
        .unwrap_or_default();

        WeatherSnapshot {
            temperature: observed.temperature.or(DEFAULT_WEATHER.temperature),
            humidity: observed.humidity.or(DEFAULT_WEATHER.humidity),
            pressure: observed.pressure.or(DEFAULT_WEATHER.pressure),
            wind_speed: observed.wind_speed.or(DEFAULT_WEATHER.wind_speed),
            wind_direction: observed.wind_direction.or(DEFAULT_WEATHER.wind_direction),
        }
    }

    fn provenance(&self) -> Provenance {
        match self {
            ForecastBaseline::History(days) => {
                let label = days
                    .last()
                    .map_or_else(|| "Historical".to_string(), |day| day.source.clone());
                Provenance::estimated(format!("Forecast from {label}"))
            }
            ForecastBaseline::Observation(observation) => Provenance {
                label: format!("Forecast from {}", observation.provenance.label),
                kind: observation.provenance.kind.max(ProvenanceKind::Estimated),
            },
        }
    }
}

/// One predicted point
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub offset_hours: u32,
    pub observation: Observation,
    pub aqi: AqiResult,
}

impl ForecastPoint {
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.observation.timestamp
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    pub coordinate: Coordinate,
    pub horizon_hours: u32,
    pub issued_at: DateTime<Utc>,
    pub points: Vec<ForecastPoint>,
}

/// Seed for the perturbations of one point.
///
/// Mixes the exact bit patterns of the coordinate with the offset
/// (splitmix64 finalizer), so neighbouring inputs give unrelated streams.
#[must_use]
pub fn perturbation_seed(coordinate: &Coordinate, offset_hours: u32) -> u64 {
    let mut z = coordinate.latitude.to_bits().rotate_left(17)
        ^ coordinate.longitude.to_bits()
        ^ u64::from(offset_hours).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn drift(weather: &WeatherSnapshot, hours: f64) -> WeatherSnapshot {
    WeatherSnapshot {
        temperature: weather.temperature.map(|t| t + TEMPERATURE_DRIFT * hours),
        humidity: weather.humidity.map(|h| h + HUMIDITY_DRIFT * hours),
        pressure: weather.pressure.map(|p| p + PRESSURE_DRIFT * hours),
        wind_speed: weather.wind_speed.map(|w| w + WIND_SPEED_DRIFT * hours),
        wind_direction: weather
            .wind_direction
            .map(|d| (d + WIND_DIRECTION_DRIFT * hours).rem_euclid(360.0)),
    }
}

/// Project a baseline forward, one point every [`STEP_HOURS`] below `horizon_hours`
#[must_use]
pub fn project(
    baseline: &ForecastBaseline,
    horizon_hours: u32,
    coordinate: Coordinate,
    issued_at: DateTime<Utc>,
) -> ForecastSeries {
    let latest = baseline.latest_values();
    let weather = baseline.starting_weather();
    let provenance = baseline.provenance();

    let points = (0..horizon_hours)
        .step_by(STEP_HOURS as usize)
        .map(|offset| {
            let mut rng = StdRng::seed_from_u64(perturbation_seed(&coordinate, offset));
            let timestamp = issued_at + ChronoDuration::hours(i64::from(offset));

            let observation = latest.iter().fold(
                Observation::new(coordinate, timestamp, provenance.clone())
                    .with_weather(drift(&weather, f64::from(offset))),
                |observation, (pollutant, value)| {
                    let factor: f64 = rng.random_range(PERTURBATION_LOW..=PERTURBATION_HIGH);
                    observation.with_reading(*pollutant, value * factor)
                },
            );
            let aqi = AqiResult::from_concentrations(observation.concentrations());

            ForecastPoint {
                offset_hours: offset,
                observation,
                aqi,
            }
        })
        .collect();

    ForecastSeries {
        coordinate,
        horizon_hours,
        issued_at,
        points,
    }
}

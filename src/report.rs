//! Flat, serializable views of engine results for the outer surface

use crate::aqi::AqiResult;
use crate::forecast::{ForecastPoint, ForecastSeries};
use crate::models::{Observation, Pollutant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReport {
    pub latitude: f64,
    pub longitude: f64,
    pub aqi: u16,
    pub primary_pollutant: String,
    pub category: String,
    pub color: String,
    pub timestamp: DateTime<Utc>,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub co: Option<f64>,
    pub so2: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub source: String,
}

impl AirQualityReport {
    #[must_use]
    pub fn new(observation: &Observation, aqi: &AqiResult) -> Self {
        let weather = observation.weather.unwrap_or_default();
        Self {
            latitude: observation.coordinate.latitude,
            longitude: observation.coordinate.longitude,
            aqi: aqi.index,
            primary_pollutant: aqi.primary_pollutant_label().to_string(),
            category: aqi.category.to_string(),
            color: aqi.color.to_string(),
            timestamp: observation.timestamp,
            pm25: observation.concentration(Pollutant::Pm25),
            pm10: observation.concentration(Pollutant::Pm10),
            no2: observation.concentration(Pollutant::No2),
            o3: observation.concentration(Pollutant::O3),
            co: observation.concentration(Pollutant::Co),
            so2: observation.concentration(Pollutant::So2),
            temperature: weather.temperature,
            humidity: weather.humidity,
            pressure: weather.pressure,
            wind_speed: weather.wind_speed,
            wind_direction: weather.wind_direction,
            source: observation.provenance.label.clone(),
        }
    }
}

impl From<&ForecastPoint> for AirQualityReport {
    fn from(point: &ForecastPoint) -> Self {
        Self::new(&point.observation, &point.aqi)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub latitude: f64,
    pub longitude: f64,
    pub forecast_hours: u32,
    pub timestamp: DateTime<Utc>,
    pub predictions: Vec<AirQualityReport>,
}

impl From<&ForecastSeries> for ForecastReport {
    fn from(series: &ForecastSeries) -> Self {
        Self {
            latitude: series.coordinate.latitude,
            longitude: series.coordinate.longitude,
            forecast_hours: series.horizon_hours,
            timestamp: series.issued_at,
            predictions: series.points.iter().map(AirQualityReport::from).collect(),
        }
    }
}

/// Index computed from client-supplied concentrations, echoing the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiReport {
    pub aqi: u16,
    pub primary_pollutant: String,
    pub category: String,
    pub color: String,
    pub pollutants: BTreeMap<String, Option<f64>>,
}

impl AqiReport {
    #[must_use]
    pub fn new(result: &AqiResult, pollutants: BTreeMap<String, Option<f64>>) -> Self {
        Self {
            aqi: result.index,
            primary_pollutant: result.primary_pollutant_label().to_string(),
            category: result.category.to_string(),
            color: result.color.to_string(),
            pollutants,
        }
    }
}

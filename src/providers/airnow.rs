//! AirNow current observations (US only)
//!
//! The current-observation feed reports an AQI per parameter and usually no
//! concentration; those rows are inverted through the breakpoint tables and
//! the observation is marked as estimated.

use super::error::{FetchError, Result};
use super::http::{encode, get_json};
use super::{AirQualityProvider, normalize_or_skip, require_credential, seconds};
use crate::aqi::concentration_for_index;
use crate::config::AirNowConfig;
use crate::models::{BoundingBox, Coordinate, Observation, Pollutant, Provenance, Unit};
use async_trait::async_trait;
use chrono::Utc;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

const SOURCE: &str = "AirNow (Real-time)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AirNowRow {
    #[serde(default)]
    pub parameter_name: Option<String>,
    #[serde(default, rename = "AQI")]
    pub aqi: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl AirNowRow {
    fn unit(&self) -> Unit {
        match self.unit.as_deref().map(str::to_ascii_uppercase).as_deref() {
            Some("UG/M3") => Unit::MicrogramsPerCubicMeter,
            Some("PPB") => Unit::PartsPerBillion,
            Some("PPM") => Unit::PartsPerMillion,
            Some(other) => Unit::from_label(other),
            None => Unit::Unspecified,
        }
    }
}

pub fn observation_from_rows(coordinate: Coordinate, rows: &[AirNowRow]) -> Result<Observation> {
    let mut observation = Observation::new(coordinate, Utc::now(), Provenance::measured(SOURCE));
    let mut estimated = false;

    for row in rows {
        let Some(name) = row.parameter_name.as_deref() else {
            continue;
        };
        let Ok(pollutant) = name.parse::<Pollutant>() else {
            debug!("Ignoring AirNow parameter '{}'", name);
            continue;
        };

        let reading = match (row.value, row.aqi) {
            (Some(value), _) => normalize_or_skip(pollutant, value, row.unit(), SOURCE),
            (None, Some(index)) if index >= 0.0 => match concentration_for_index(pollutant, index) {
                Ok(concentration) => {
                    estimated = true;
                    normalize_or_skip(pollutant, concentration, Unit::MicrogramsPerCubicMeter, SOURCE)
                }
                Err(e) => {
                    debug!("Cannot invert AirNow AQI: {}", e);
                    None
                }
            },
            _ => None,
        };

        if let Some(reading) = reading {
            observation.readings.insert(pollutant, reading);
        }
    }

    if !observation.has_data() {
        return Err(FetchError::EmptyResult);
    }
    if estimated {
        observation.provenance = Provenance::estimated(SOURCE);
    }
    Ok(observation)
}

pub struct AirNowClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    distance_miles: u32,
    coverage: BoundingBox,
}

impl AirNowClient {
    pub fn new(client: ClientWithMiddleware, config: &AirNowConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: seconds(config.timeout_seconds),
            distance_miles: config.distance_miles,
            coverage: config.coverage,
        }
    }
}

#[async_trait]
impl AirQualityProvider for AirNowClient {
    fn name(&self) -> &str {
        "AirNow"
    }

    fn coverage(&self) -> Option<BoundingBox> {
        Some(self.coverage)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip(self), fields(provider = "AirNow"))]
    async fn fetch_current(&self, coordinate: Coordinate) -> Result<Observation> {
        if !self.coverage.contains(&coordinate) {
            return Err(FetchError::EmptyResult);
        }
        let key = require_credential(self.api_key.as_deref(), self.name())?;

        let url = format!(
            "{}/latLong/current/?format=application/json&latitude={}&longitude={}&distance={}&API_KEY={}",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            self.distance_miles,
            encode(key)
        );

        let rows: Vec<AirNowRow> =
            get_json(self.client.get(&url).timeout(self.timeout), self.name()).await?;
        let observation = observation_from_rows(coordinate, &rows)?;

        info!("AirNow returned {} pollutant readings", observation.readings.len());
        Ok(observation)
    }
}

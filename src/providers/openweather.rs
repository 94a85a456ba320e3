//! OpenWeatherMap air pollution API

use super::error::{FetchError, Result};
use super::http::{encode, get_json};
use super::{AirQualityProvider, normalize_or_skip, require_credential, seconds};
use crate::config::OpenWeatherConfig;
use crate::models::{Coordinate, Observation, Pollutant, Provenance, Unit};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

const SOURCE: &str = "OpenWeatherMap (Real-time)";

#[derive(Debug, Deserialize)]
pub struct AirPollutionResponse {
    #[serde(default)]
    pub list: Vec<AirPollutionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AirPollutionEntry {
    /// Unix timestamp in seconds
    #[serde(default)]
    pub dt: Option<i64>,
    /// Component concentrations in µg/m³, keyed `pm2_5`, `no2`, `nh3`, ...
    #[serde(default)]
    pub components: BTreeMap<String, Option<f64>>,
}

pub fn observation_from_response(
    coordinate: Coordinate,
    response: AirPollutionResponse,
) -> Result<Observation> {
    let entry = response.list.into_iter().next().ok_or(FetchError::EmptyResult)?;

    let timestamp = entry
        .dt
        .and_then(|dt| DateTime::from_timestamp(dt, 0))
        .unwrap_or_else(Utc::now);
    let mut observation = Observation::new(coordinate, timestamp, Provenance::measured(SOURCE));

    for (name, value) in &entry.components {
        let Ok(pollutant) = name.parse::<Pollutant>() else {
            debug!("Ignoring OpenWeatherMap component '{}'", name);
            continue;
        };
        let Some(value) = value else { continue };
        if let Some(reading) =
            normalize_or_skip(pollutant, *value, Unit::MicrogramsPerCubicMeter, SOURCE)
        {
            observation.readings.insert(pollutant, reading);
        }
    }

    if !observation.has_data() {
        return Err(FetchError::EmptyResult);
    }
    Ok(observation)
}

pub struct OpenWeatherClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenWeatherClient {
    pub fn new(client: ClientWithMiddleware, config: &OpenWeatherConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: seconds(config.timeout_seconds),
        }
    }
}

#[async_trait]
impl AirQualityProvider for OpenWeatherClient {
    fn name(&self) -> &str {
        "OpenWeatherMap"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip(self), fields(provider = "OpenWeatherMap"))]
    async fn fetch_current(&self, coordinate: Coordinate) -> Result<Observation> {
        let appid = require_credential(self.api_key.as_deref(), self.name())?;
        let url = format!(
            "{}/air_pollution?lat={}&lon={}&appid={}",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            encode(appid)
        );

        let response: AirPollutionResponse =
            get_json(self.client.get(&url).timeout(self.timeout), self.name()).await?;
        let observation = observation_from_response(coordinate, response)?;

        info!(
            "OpenWeatherMap returned {} pollutant readings",
            observation.readings.len()
        );
        Ok(observation)
    }
}

//! World Air Quality Index project (aqicn.org) geo feed
//!
//! The feed reports a US AQI sub-index per pollutant, not a concentration;
//! each is inverted through the breakpoint tables, so observations from this
//! source are always estimated.

use super::error::{FetchError, Result};
use super::http::{encode, get_json};
use super::{AirQualityProvider, normalize_or_skip, require_credential, seconds};
use crate::aqi::concentration_for_index;
use crate::config::WaqiConfig;
use crate::models::{Coordinate, Observation, Pollutant, Provenance, Unit, WeatherSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

const SOURCE: &str = "World Air Quality Index (Real-time)";

/// Envelope; `data` is an object on success and an error string otherwise
#[derive(Debug, Deserialize)]
pub struct WaqiResponse {
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct WaqiData {
    #[serde(default)]
    pub iaqi: BTreeMap<String, IaqiValue>,
    #[serde(default)]
    pub time: Option<WaqiTime>,
}

#[derive(Debug, Deserialize)]
pub struct IaqiValue {
    pub v: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct WaqiTime {
    #[serde(default)]
    pub iso: Option<String>,
}

/// Translate a decoded feed response into an observation.
///
/// Per-pollutant `iaqi` sub-indices become µg/m³ estimates.
pub fn observation_from_response(
    coordinate: Coordinate,
    response: WaqiResponse,
) -> Result<Observation> {
    if response.status != "ok" {
        let message = response.data.as_str().unwrap_or_default();
        return Err(if message.to_ascii_lowercase().contains("invalid key") {
            FetchError::Unauthenticated(format!("WAQI: {message}"))
        } else {
            FetchError::EmptyResult
        });
    }

    let data: WaqiData = serde_json::from_value(response.data)
        .map_err(|e| FetchError::ParseFailure(format!("Failed to parse WAQI data: {e}")))?;

    let value = |key: &str| data.iaqi.get(key).and_then(|entry| entry.v);
    let weather = WeatherSnapshot {
        temperature: value("t"),
        humidity: value("h"),
        pressure: value("p"),
        wind_speed: value("w"),
        wind_direction: None,
    };

    let timestamp = data
        .time
        .as_ref()
        .and_then(|t| t.iso.as_deref())
        .and_then(|iso| DateTime::parse_from_rfc3339(iso).ok())
        .map_or_else(Utc::now, |t| t.with_timezone(&Utc));

    let mut observation = Observation::new(coordinate, timestamp, Provenance::estimated(SOURCE))
        .with_weather(weather);

    for pollutant in [Pollutant::Pm25, Pollutant::Pm10, Pollutant::No2, Pollutant::O3] {
        let Some(index) = value(pollutant.key()).filter(|index| *index >= 0.0) else {
            continue;
        };
        let concentration = match concentration_for_index(pollutant, index) {
            Ok(concentration) => concentration,
            Err(e) => {
                debug!("Cannot invert WAQI sub-index: {}", e);
                continue;
            }
        };
        if let Some(reading) =
            normalize_or_skip(pollutant, concentration, Unit::MicrogramsPerCubicMeter, SOURCE)
        {
            observation.readings.insert(pollutant, reading);
        }
    }

    if !observation.has_data() {
        return Err(FetchError::EmptyResult);
    }
    Ok(observation)
}

pub struct WaqiClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl WaqiClient {
    pub fn new(client: ClientWithMiddleware, config: &WaqiConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: seconds(config.timeout_seconds),
        }
    }
}

#[async_trait]
impl AirQualityProvider for WaqiClient {
    fn name(&self) -> &str {
        "WAQI"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip(self), fields(provider = "WAQI"))]
    async fn fetch_current(&self, coordinate: Coordinate) -> Result<Observation> {
        let token = require_credential(self.api_key.as_deref(), self.name())?;
        let url = format!(
            "{}/geo:{};{}/?token={}",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            encode(token)
        );

        let response: WaqiResponse =
            get_json(self.client.get(&url).timeout(self.timeout), self.name()).await?;
        let observation = observation_from_response(coordinate, response)?;

        info!("WAQI returned {} pollutant readings", observation.readings.len());
        Ok(observation)
    }
}

//! AirVisual (IQAir) nearest-city API

use super::error::{FetchError, Result};
use super::http::{encode, get_json};
use super::{AirQualityProvider, require_credential, seconds};
use crate::config::AirVisualConfig;
use crate::models::{Coordinate, Observation, Pollutant, Provenance, WeatherSnapshot};
use crate::units::airvisual_aqi_to_pm25;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

const SOURCE: &str = "AirVisual API (Real-time)";

#[derive(Debug, Deserialize)]
pub struct NearestCityResponse {
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct CityData {
    pub current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
pub struct CurrentConditions {
    #[serde(default)]
    pub pollution: Option<Pollution>,
    #[serde(default)]
    pub weather: Option<Weather>,
}

#[derive(Debug, Deserialize)]
pub struct Pollution {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub aqius: Option<f64>,
}

/// Abbreviated weather fields as sent by AirVisual
#[derive(Debug, Deserialize)]
pub struct Weather {
    #[serde(default)]
    pub tp: Option<f64>,
    #[serde(default)]
    pub hu: Option<f64>,
    #[serde(default)]
    pub pr: Option<f64>,
    #[serde(default)]
    pub ws: Option<f64>,
    #[serde(default)]
    pub wd: Option<f64>,
}

impl From<Weather> for WeatherSnapshot {
    fn from(weather: Weather) -> Self {
        WeatherSnapshot {
            temperature: weather.tp,
            humidity: weather.hu,
            pressure: weather.pr,
            wind_speed: weather.ws,
            wind_direction: weather.wd,
        }
    }
}

/// Only a US-AQI figure is published, so PM2.5 is reverse-mapped and estimated
pub fn observation_from_response(
    coordinate: Coordinate,
    response: NearestCityResponse,
) -> Result<Observation> {
    if response.status != "success" {
        let message = response
            .data
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default();
        return Err(match message {
            "incorrect_api_key" | "api_key_expired" | "permission_denied" => {
                FetchError::Unauthenticated(format!("AirVisual: {message}"))
            }
            _ => FetchError::EmptyResult,
        });
    }

    let data: CityData = serde_json::from_value(response.data)
        .map_err(|e| FetchError::ParseFailure(format!("Failed to parse AirVisual data: {e}")))?;

    let pollution = data.current.pollution.ok_or(FetchError::EmptyResult)?;
    let aqi = pollution
        .aqius
        .filter(|a| a.is_finite() && *a >= 0.0)
        .ok_or(FetchError::EmptyResult)?;

    let timestamp = pollution
        .ts
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map_or_else(Utc::now, |t| t.with_timezone(&Utc));

    let mut observation = Observation::new(coordinate, timestamp, Provenance::estimated(SOURCE))
        .with_reading(Pollutant::Pm25, airvisual_aqi_to_pm25(aqi));
    if let Some(weather) = data.current.weather {
        observation = observation.with_weather(weather.into());
    }
    Ok(observation)
}

pub struct AirVisualClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl AirVisualClient {
    pub fn new(client: ClientWithMiddleware, config: &AirVisualConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: seconds(config.timeout_seconds),
        }
    }
}

#[async_trait]
impl AirQualityProvider for AirVisualClient {
    fn name(&self) -> &str {
        "AirVisual"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip(self), fields(provider = "AirVisual"))]
    async fn fetch_current(&self, coordinate: Coordinate) -> Result<Observation> {
        let key = require_credential(self.api_key.as_deref(), self.name())?;
        let url = format!(
            "{}/nearest_city?lat={}&lon={}&key={}",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            encode(key)
        );

        let response: NearestCityResponse =
            get_json(self.client.get(&url).timeout(self.timeout), self.name()).await?;
        let observation = observation_from_response(coordinate, response)?;

        info!("AirVisual returned an estimated PM2.5 reading");
        Ok(observation)
    }
}

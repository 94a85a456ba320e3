//! OpenAQ measurement network, the primary provider family.
//!
//! v2 works without a key; v3 requires `X-API-Key`. Both share the
//! `/measurements` shape closely enough to decode with one set of DTOs.

use super::error::{FetchError, Result};
use super::http::{encode, get_json};
use super::{AirQualityProvider, normalize_or_skip, require_credential, seconds};
use crate::config::OpenAqConfig;
use crate::models::{
    Coordinate, Observation, Pollutant, PollutantReading, Provenance, Unit, WeatherSnapshot,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Stations farther than this do not contribute weather readings
pub const WEATHER_STATION_RADIUS_KM: f64 = 10.0;

const CURRENT_LIMIT: u32 = 100;
const HISTORICAL_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAqVersion {
    V2,
    V3,
}

/// Measurements response shared by v2 and v3
#[derive(Debug, Deserialize)]
pub struct MeasurementsResponse {
    #[serde(default)]
    pub results: Vec<MeasurementRow>,
}

#[derive(Debug, Deserialize)]
pub struct MeasurementRow {
    #[serde(default)]
    pub parameter: Option<ParameterField>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// v2 timestamp
    #[serde(default)]
    pub date: Option<UtcStamp>,
    /// v3 timestamp
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub coordinates: Option<StationCoordinates>,
}

/// v2 sends the parameter as a bare name, v3 as an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ParameterField {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        units: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct UtcStamp {
    #[serde(default)]
    pub utc: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    #[serde(default)]
    pub datetime_to: Option<UtcStamp>,
}

#[derive(Debug, Deserialize)]
pub struct StationCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl MeasurementRow {
    fn parameter_name(&self) -> Option<&str> {
        match self.parameter.as_ref()? {
            ParameterField::Name(name) | ParameterField::Detailed { name, .. } => Some(name.as_str()),
        }
    }

    fn unit(&self) -> Unit {
        let label = match &self.parameter {
            Some(ParameterField::Detailed { units: Some(units), .. }) => Some(units.as_str()),
            _ => self.unit.as_deref(),
        };
        label.map_or(Unit::Unspecified, Unit::from_label)
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self
            .date
            .as_ref()
            .and_then(|d| d.utc.as_deref())
            .or_else(|| {
                self.period
                    .as_ref()
                    .and_then(|p| p.datetime_to.as_ref())
                    .and_then(|d| d.utc.as_deref())
            })?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    fn station(&self) -> Option<Coordinate> {
        let coordinates = self.coordinates.as_ref()?;
        Coordinate::new(coordinates.latitude, coordinates.longitude).ok()
    }
}

#[derive(Debug, Clone, Copy)]
enum WeatherField {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    WindDirection,
}

fn weather_field(name: &str) -> Option<WeatherField> {
    match name.to_ascii_lowercase().replace('_', "").as_str() {
        "temperature" => Some(WeatherField::Temperature),
        "humidity" | "relativehumidity" => Some(WeatherField::Humidity),
        "pressure" => Some(WeatherField::Pressure),
        "windspeed" => Some(WeatherField::WindSpeed),
        "winddirection" => Some(WeatherField::WindDirection),
        _ => None,
    }
}

/// Build one observation from the most recent reading of each pollutant.
///
/// Weather parameters are taken only from stations within
/// [`WEATHER_STATION_RADIUS_KM`] of the requested coordinate.
pub fn observation_from_rows(
    coordinate: Coordinate,
    rows: &[MeasurementRow],
    provenance: Provenance,
) -> Result<Observation> {
    let mut latest: BTreeMap<Pollutant, (Option<DateTime<Utc>>, PollutantReading)> = BTreeMap::new();
    let mut weather = WeatherSnapshot::default();
    let mut newest: Option<DateTime<Utc>> = None;

    for row in rows {
        let (Some(name), Some(value)) = (row.parameter_name(), row.value) else {
            continue;
        };
        let timestamp = row.timestamp();

        if let Some(field) = weather_field(name) {
            let near = row
                .station()
                .is_some_and(|station| station.distance_km(&coordinate) <= WEATHER_STATION_RADIUS_KM);
            if near {
                let slot = match field {
                    WeatherField::Temperature => &mut weather.temperature,
                    WeatherField::Humidity => &mut weather.humidity,
                    WeatherField::Pressure => &mut weather.pressure,
                    WeatherField::WindSpeed => &mut weather.wind_speed,
                    WeatherField::WindDirection => &mut weather.wind_direction,
                };
                slot.get_or_insert(value);
            }
            continue;
        }

        let Ok(pollutant) = name.parse::<Pollutant>() else {
            debug!("Ignoring OpenAQ parameter '{}'", name);
            continue;
        };
        let Some(reading) = normalize_or_skip(pollutant, value, row.unit(), &provenance.label) else {
            continue;
        };

        let replace = match latest.get(&pollutant) {
            None => true,
            Some((existing, _)) => timestamp > *existing,
        };
        if replace {
            latest.insert(pollutant, (timestamp, reading));
        }
        newest = newest.max(timestamp);
    }

    if latest.is_empty() {
        return Err(FetchError::EmptyResult);
    }

    let mut observation =
        Observation::new(coordinate, newest.unwrap_or_else(Utc::now), provenance).with_weather(weather);
    observation.readings = latest
        .into_iter()
        .map(|(pollutant, (_, reading))| (pollutant, reading))
        .collect();
    Ok(observation)
}

/// Turn each timestamped pollutant row into a single-reading observation
pub fn history_from_rows(
    coordinate: Coordinate,
    rows: &[MeasurementRow],
    provenance: &Provenance,
) -> Vec<Observation> {
    rows.iter()
        .filter_map(|row| {
            let pollutant = row.parameter_name()?.parse::<Pollutant>().ok()?;
            let timestamp = row.timestamp()?;
            let reading = normalize_or_skip(pollutant, row.value?, row.unit(), &provenance.label)?;
            let mut observation = Observation::new(coordinate, timestamp, provenance.clone());
            observation.readings.insert(pollutant, reading);
            Some(observation)
        })
        .collect()
}

/// One variant of the OpenAQ family
pub struct OpenAqClient {
    client: ClientWithMiddleware,
    version: OpenAqVersion,
    base_url: String,
    api_key: Option<String>,
    radius_meters: u32,
    historical_radius_meters: u32,
    timeout: Duration,
    historical_timeout: Duration,
}

impl OpenAqClient {
    pub fn new(client: ClientWithMiddleware, config: &OpenAqConfig, version: OpenAqVersion) -> Self {
        let base_url = match version {
            OpenAqVersion::V2 => &config.v2_base_url,
            OpenAqVersion::V3 => &config.v3_base_url,
        };

        Self {
            client,
            version,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            radius_meters: config.radius_meters,
            historical_radius_meters: config.historical_radius_meters,
            timeout: seconds(config.timeout_seconds),
            historical_timeout: seconds(config.historical_timeout_seconds),
        }
    }

    fn provenance(&self) -> Provenance {
        Provenance::measured(self.name())
    }

    /// Query string shared by both endpoints; v3 spells its parameters in camelCase
    fn measurements_url(
        &self,
        coordinate: &Coordinate,
        radius: u32,
        limit: u32,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> String {
        let sort = if window.is_some() { "asc" } else { "desc" };
        let mut url = format!(
            "{}/measurements?coordinates={},{}&radius={}&limit={}&sort={}",
            self.base_url, coordinate.latitude, coordinate.longitude, radius, limit, sort
        );

        if self.version == OpenAqVersion::V3 {
            url.push_str("&orderBy=datetime");
        }

        if let Some((from, to)) = window {
            let (from_key, to_key) = match self.version {
                OpenAqVersion::V2 => ("date_from", "date_to"),
                OpenAqVersion::V3 => ("dateFrom", "dateTo"),
            };
            let format = "%Y-%m-%dT%H:%M:%SZ";
            url.push_str(&format!(
                "&{}={}&{}={}",
                from_key,
                encode(&from.format(format).to_string()),
                to_key,
                encode(&to.format(format).to_string())
            ));
        }

        url
    }

    async fn fetch_rows(&self, url: String, timeout: Duration) -> Result<Vec<MeasurementRow>> {
        let key = match self.version {
            OpenAqVersion::V2 => self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()),
            OpenAqVersion::V3 => Some(require_credential(self.api_key.as_deref(), self.name())?),
        };

        let mut request = self.client.get(&url).timeout(timeout);
        if let Some(key) = key {
            request = request.header("X-API-Key", key);
        }

        let response: MeasurementsResponse = get_json(request, self.name()).await?;
        if response.results.is_empty() {
            return Err(FetchError::EmptyResult);
        }
        Ok(response.results)
    }
}

#[async_trait]
impl AirQualityProvider for OpenAqClient {
    fn name(&self) -> &str {
        match self.version {
            OpenAqVersion::V2 => "OpenAQ",
            OpenAqVersion::V3 => "OpenAQ v3",
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn historical_timeout(&self) -> Duration {
        self.historical_timeout
    }

    #[instrument(skip(self), fields(provider = self.name()))]
    async fn fetch_current(&self, coordinate: Coordinate) -> Result<Observation> {
        let url = self.measurements_url(&coordinate, self.radius_meters, CURRENT_LIMIT, None);
        let rows = self.fetch_rows(url, self.timeout).await?;
        let observation = observation_from_rows(coordinate, &rows, self.provenance())?;

        info!(
            "{} returned {} pollutant readings for {}",
            self.name(),
            observation.readings.len(),
            coordinate.format_coordinates()
        );
        Ok(observation)
    }

    #[instrument(skip(self), fields(provider = self.name()))]
    async fn fetch_historical(&self, coordinate: Coordinate, days: u32) -> Result<Vec<Observation>> {
        let to = Utc::now();
        let from = to - ChronoDuration::days(i64::from(days));
        let url = self.measurements_url(
            &coordinate,
            self.historical_radius_meters,
            HISTORICAL_LIMIT,
            Some((from, to)),
        );

        let rows = self.fetch_rows(url, self.historical_timeout).await?;
        let history = history_from_rows(coordinate, &rows, &self.provenance());
        if history.is_empty() {
            return Err(FetchError::EmptyResult);
        }

        info!("{} returned {} historical readings", self.name(), history.len());
        Ok(history)
    }
}

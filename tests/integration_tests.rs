//! Integration tests for the Sky Forecaster library and CLI

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use skyforecaster::models::BoundingBox;
use skyforecaster::pipeline::SharedProvider;
use skyforecaster::{
    AggregationPipeline, AirQualityProvider, AirQualityReport, AirQualityService, Coordinate,
    FetchError, ForecastReport, Observation, Pollutant, Provenance, ProvenanceKind,
    SkyForecastError,
};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

/// Provider returning the same answer on every call
struct StaticProvider {
    name: &'static str,
    readings: Vec<(Pollutant, f64)>,
    coverage: Option<BoundingBox>,
    history_days: u32,
}

impl StaticProvider {
    fn new(name: &'static str, readings: &[(Pollutant, f64)]) -> Self {
        Self {
            name,
            readings: readings.to_vec(),
            coverage: None,
            history_days: 0,
        }
    }

    fn observation(&self, coordinate: Coordinate, days_ago: i64) -> Observation {
        self.readings.iter().fold(
            Observation::new(
                coordinate,
                Utc::now() - ChronoDuration::days(days_ago),
                Provenance::measured(self.name),
            ),
            |observation, (pollutant, value)| observation.with_reading(*pollutant, *value),
        )
    }
}

#[async_trait]
impl AirQualityProvider for StaticProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn coverage(&self) -> Option<BoundingBox> {
        self.coverage
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn fetch_current(&self, coordinate: Coordinate) -> Result<Observation, FetchError> {
        if self.readings.is_empty() {
            return Err(FetchError::EmptyResult);
        }
        Ok(self.observation(coordinate, 0))
    }

    async fn fetch_historical(
        &self,
        coordinate: Coordinate,
        _days: u32,
    ) -> Result<Vec<Observation>, FetchError> {
        if self.history_days == 0 {
            return Err(FetchError::EmptyResult);
        }
        Ok((0..i64::from(self.history_days))
            .map(|days_ago| self.observation(coordinate, days_ago))
            .collect())
    }
}

fn shared(provider: StaticProvider) -> SharedProvider {
    Arc::new(provider)
}

#[tokio::test]
async fn test_fallback_with_satellite_gap_fill() {
    let primary = shared(StaticProvider::new("OpenAQ", &[]));
    let realtime = shared(StaticProvider::new("WAQI", &[(Pollutant::Pm25, 35.5)]));
    let mut satellite = StaticProvider::new(
        "NASA TEMPO",
        &[(Pollutant::Pm25, 5.0), (Pollutant::No2, 25.0)],
    );
    satellite.coverage = Some(BoundingBox::TEMPO_FIELD_OF_REGARD);

    let pipeline = AggregationPipeline::new(vec![primary], vec![realtime], Some(shared(satellite)));
    let service = AirQualityService::new(pipeline, 7);

    let result = service.current_conditions(34.05, -118.24).await.unwrap();
    assert_eq!(result.observation.concentration(Pollutant::Pm25), Some(35.5));
    assert_eq!(result.observation.concentration(Pollutant::No2), Some(25.0));
    assert_eq!(result.observation.provenance.label, "WAQI + NASA TEMPO");
    assert_eq!(result.aqi.index, 101);

    // Outside the satellite field of regard only the real-time source answers
    let result = service.current_conditions(-33.87, 151.21).await.unwrap();
    assert_eq!(result.observation.concentration(Pollutant::No2), None);
    assert_eq!(result.observation.provenance.label, "WAQI");
}

#[tokio::test]
async fn test_report_shape() {
    let primary = shared(StaticProvider::new(
        "OpenAQ",
        &[(Pollutant::Pm25, 12.0), (Pollutant::Co, 400.0)],
    ));
    let service = AirQualityService::new(AggregationPipeline::new(vec![primary], vec![], None), 7);

    let result = service.current_conditions(51.5, -0.12).await.unwrap();
    let value = serde_json::to_value(AirQualityReport::from(&result)).unwrap();

    for key in [
        "latitude",
        "longitude",
        "aqi",
        "primary_pollutant",
        "category",
        "color",
        "timestamp",
        "pm25",
        "pm10",
        "no2",
        "o3",
        "co",
        "so2",
        "temperature",
        "humidity",
        "pressure",
        "wind_speed",
        "wind_direction",
        "source",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["aqi"], 50);
    assert_eq!(value["primary_pollutant"], "pm25");
    assert_eq!(value["co"], 400.0);
    assert_eq!(value["so2"], Value::Null);
}

#[tokio::test]
async fn test_forecast_from_history_and_validation() {
    let mut primary = StaticProvider::new("OpenAQ", &[(Pollutant::O3, 60.0)]);
    primary.history_days = 3;
    let service =
        AirQualityService::new(AggregationPipeline::new(vec![shared(primary)], vec![], None), 7);

    let series = service.forecast(34.05, -118.24, 48).await.unwrap();
    let report = ForecastReport::from(&series);
    assert_eq!(report.forecast_hours, 48);
    assert_eq!(report.predictions.len(), 8);
    assert!(
        report
            .predictions
            .iter()
            .all(|p| p.source == "Forecast from OpenAQ Historical")
    );
    assert!(report.predictions.iter().all(|p| p.primary_pollutant == "o3"));

    assert!(matches!(
        service.forecast(34.05, -118.24, 169).await,
        Err(SkyForecastError::InvalidHorizon { hours: 169 })
    ));
    assert!(matches!(
        service.forecast(134.05, -118.24, 24).await,
        Err(SkyForecastError::InvalidCoordinate { .. })
    ));
}

#[tokio::test]
async fn test_no_providers_yields_synthetic() {
    let service = AirQualityService::new(AggregationPipeline::new(vec![], vec![], None), 7);
    let first = service.current_conditions(40.71, -74.01).await.unwrap();
    let second = service.current_conditions(40.71, -74.01).await.unwrap();

    assert_eq!(first.observation.provenance.kind, ProvenanceKind::Synthetic);
    assert_eq!(first.observation.readings, second.observation.readings);
    assert_eq!(first.aqi, second.aqi);
}

fn cli() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_skyforecaster"));
    command.env_clear();
    command
}

/// Configuration path that does not exist, so only defaults and env apply
fn missing_config() -> PathBuf {
    std::env::temp_dir().join("skyforecaster-integration-missing.toml")
}

#[test]
fn test_cli_aqi_command() {
    let output = cli()
        .args(["aqi", "pm25=35.5", "o3=null", "radon=3"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["aqi"], 101);
    assert_eq!(value["primary_pollutant"], "pm25");
    assert_eq!(value["category"], "Unhealthy for Sensitive Groups");
    assert_eq!(value["color"], "#ff7e00");
    assert_eq!(value["pollutants"]["o3"], Value::Null);
    assert_eq!(value["pollutants"]["radon"], 3.0);
}

#[test]
fn test_cli_rejects_malformed_aqi_argument() {
    let output = cli()
        .args(["aqi", "pm25"])
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());
}

#[test]
fn test_cli_rejects_non_finite_concentration() {
    let output = cli()
        .args(["aqi", "pm25=inf", "o3=60"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid pollutant value"), "stderr: {stderr}");
}

#[test]
fn test_cli_current_without_reachable_providers() {
    // OpenAQ v2 needs no key; point it at a closed local port
    let output = cli()
        .arg("--config")
        .arg(missing_config())
        .args(["current", "34.05", "-118.24"])
        .env("SKYFORECAST_PROVIDERS__OPENAQ__V2_BASE_URL", "http://127.0.0.1:9")
        .env("SKYFORECAST_PROVIDERS__OPENAQ__TIMEOUT_SECONDS", "2")
        .env("SKYFORECAST_HTTP__MAX_RETRIES", "0")
        .env("SKYFORECAST_LOGGING__LEVEL", "error")
        .output()
        .expect("Failed to execute command");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["latitude"], 34.05);
    assert_eq!(value["longitude"], -118.24);
    assert!(
        value["source"]
            .as_str()
            .unwrap()
            .starts_with("Synthetic estimate")
    );
}

#[test]
fn test_cli_forecast_rejects_horizon() {
    let output = cli()
        .arg("--config")
        .arg(missing_config())
        .args(["forecast", "34.05", "-118.24", "200"])
        .env("SKYFORECAST_PROVIDERS__OPENAQ__V2_BASE_URL", "http://127.0.0.1:9")
        .env("SKYFORECAST_HTTP__MAX_RETRIES", "0")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid hours parameter (1-168)"), "stderr: {stderr}");
}

//! Air quality service
//!
//! The operations exposed to callers: current conditions, forecasts and
//! direct AQI calculation. Inputs are validated here; everything below
//! works on typed coordinates and never fails.

use crate::aqi::{AqiResult, calculate_aqi_named};
use crate::config::SkyForecastConfig;
use crate::Result;
use crate::error::SkyForecastError;
use crate::forecast::{self, ForecastBaseline, ForecastSeries, MAX_HORIZON_HOURS};
use crate::models::{Coordinate, Observation, Pollutant, Unit};
use crate::pipeline::AggregationPipeline;
use crate::report::AirQualityReport;
use crate::synthetic;
use crate::units;
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, instrument};

/// Combined observation with its derived index
#[derive(Debug, Clone, PartialEq)]
pub struct AirQualityResult {
    pub observation: Observation,
    pub aqi: AqiResult,
}

impl AirQualityResult {
    #[must_use]
    pub fn from_observation(observation: Observation) -> Self {
        let aqi = AqiResult::from_concentrations(observation.concentrations());
        Self { observation, aqi }
    }
}

impl From<&AirQualityResult> for AirQualityReport {
    fn from(result: &AirQualityResult) -> Self {
        AirQualityReport::new(&result.observation, &result.aqi)
    }
}

pub struct AirQualityService {
    pipeline: AggregationPipeline,
    history_days: u32,
}

impl AirQualityService {
    #[must_use]
    pub fn new(pipeline: AggregationPipeline, history_days: u32) -> Self {
        Self {
            pipeline,
            history_days,
        }
    }

    pub async fn from_config(config: &SkyForecastConfig) -> Result<Self> {
        let pipeline = AggregationPipeline::from_config(config).await?;
        Ok(Self::new(pipeline, config.forecast.history_days))
    }

    /// Current conditions at a coordinate. Only invalid input fails.
    #[instrument(skip(self))]
    pub async fn current_conditions(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AirQualityResult> {
        let coordinate = Coordinate::new(latitude, longitude)?;
        let started = Instant::now();

        let observation = self.pipeline.combined_observation(coordinate).await;
        let result = AirQualityResult::from_observation(observation);

        info!(
            "AQI {} ({}) at {} from {} in {:.3}s",
            result.aqi.index,
            result.aqi.category,
            coordinate.format_coordinates(),
            result.observation.provenance,
            started.elapsed().as_secs_f64()
        );
        Ok(result)
    }

    /// Forecast for the next `hours` hours, one point every six hours.
    ///
    /// Projects from daily history when the primary provider has any,
    /// otherwise from the synthetic observation for the coordinate.
    #[instrument(skip(self))]
    pub async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
        hours: u32,
    ) -> Result<ForecastSeries> {
        let coordinate = Coordinate::new(latitude, longitude)?;
        if hours == 0 || hours > MAX_HORIZON_HOURS {
            return Err(SkyForecastError::InvalidHorizon { hours });
        }

        let issued_at = Utc::now();
        let history = self.pipeline.historical(coordinate, self.history_days).await;
        let baseline = if history.is_empty() {
            info!("No history, forecasting from synthetic baseline");
            ForecastBaseline::Observation(synthetic::synthesize(coordinate, issued_at))
        } else {
            ForecastBaseline::History(history)
        };

        let series = forecast::project(&baseline, hours, coordinate, issued_at);
        info!(
            "Forecast of {} points over {}h for {}",
            series.points.len(),
            hours,
            coordinate.format_coordinates()
        );
        Ok(series)
    }

    /// Index for client-supplied concentrations (µg/m³) keyed by pollutant name.
    ///
    /// Pure; needs no providers. Unknown names are skipped, while negative or
    /// non-finite values of known pollutants are rejected.
    pub fn calculate_aqi(pollutants: &BTreeMap<String, Option<f64>>) -> Result<AqiResult> {
        for (name, value) in pollutants {
            if let (Ok(pollutant), Some(value)) = (name.parse::<Pollutant>(), value) {
                units::normalize(pollutant, *value, Unit::MicrogramsPerCubicMeter)?;
            }
        }
        Ok(calculate_aqi_named(pollutants))
    }
}

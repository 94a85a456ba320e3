//! `SkyForecaster` - Multi-source air quality aggregation and forecasting
//!
//! This library queries several air quality providers with fallback,
//! normalizes their readings, derives the US AQI and projects short-range
//! forecasts from recent history.

pub mod aqi;
pub mod config;
pub mod error;
pub mod forecast;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod report;
pub mod service;
pub mod synthetic;
pub mod telemetry;
pub mod units;

// Re-export core types for public API
pub use aqi::{AqiCategory, AqiResult, calculate_aqi_named};
pub use config::SkyForecastConfig;
pub use error::SkyForecastError;
pub use forecast::{ForecastBaseline, ForecastPoint, ForecastSeries};
pub use models::{Coordinate, Observation, Pollutant, Provenance, ProvenanceKind};
pub use pipeline::AggregationPipeline;
pub use providers::{AirQualityProvider, FetchError};
pub use report::{AirQualityReport, AqiReport, ForecastReport};
pub use service::{AirQualityResult, AirQualityService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, SkyForecastError>;

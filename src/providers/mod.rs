//! Provider adapters
//!
//! Every upstream source speaks its own wire format; adapters translate it
//! into a normalized [`Observation`] or a typed [`FetchError`]. The
//! aggregation pipeline only sees the [`AirQualityProvider`] trait.

pub mod airnow;
pub mod airvisual;
pub mod error;
pub mod http;
pub mod openaq;
pub mod openweather;
pub mod tempo;
pub mod waqi;

pub use airnow::AirNowClient;
pub use airvisual::AirVisualClient;
pub use error::FetchError;
pub use openaq::{OpenAqClient, OpenAqVersion};
pub use openweather::OpenWeatherClient;
pub use tempo::{EarthdataSession, TempoClient};
pub use waqi::WaqiClient;

use crate::models::{BoundingBox, Coordinate, Observation, Pollutant, PollutantReading, Unit};
use crate::units;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Uniform capability implemented by every upstream source
#[async_trait]
pub trait AirQualityProvider: Send + Sync {
    /// Human-readable source name, used for logging and provenance
    fn name(&self) -> &str;

    /// Area outside of which the provider must not be queried
    fn coverage(&self) -> Option<BoundingBox> {
        None
    }

    /// Upper bound for one current-conditions call
    fn timeout(&self) -> Duration;

    /// Upper bound for one historical call
    fn historical_timeout(&self) -> Duration {
        self.timeout()
    }

    fn covers(&self, coordinate: &Coordinate) -> bool {
        self.coverage()
            .is_none_or(|coverage| coverage.contains(coordinate))
    }

    async fn fetch_current(&self, coordinate: Coordinate) -> error::Result<Observation>;

    /// Raw readings for the last `days` days; providers without history report `EmptyResult`
    async fn fetch_historical(
        &self,
        _coordinate: Coordinate,
        _days: u32,
    ) -> error::Result<Vec<Observation>> {
        Err(FetchError::EmptyResult)
    }
}

/// Configured credential, or `Unauthenticated` so the adapter never calls out without one
pub(crate) fn require_credential<'a>(key: Option<&'a str>, provider: &str) -> error::Result<&'a str> {
    key.map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| FetchError::Unauthenticated(format!("no API key configured for {provider}")))
}

/// Normalize one raw value, logging and dropping values the normalizer rejects
pub(crate) fn normalize_or_skip(
    pollutant: Pollutant,
    value: f64,
    unit: Unit,
    provider: &str,
) -> Option<PollutantReading> {
    match units::normalized_reading(pollutant, value, unit) {
        Ok(reading) => Some(reading),
        Err(e) => {
            warn!("Dropping {} reading: {}", provider, e);
            None
        }
    }
}

/// Seconds to `Duration`, as stored in configuration
pub(crate) fn seconds(value: u32) -> Duration {
    Duration::from_secs(u64::from(value))
}

//! NASA TEMPO satellite product, used as a supplementary source.
//!
//! Access requires an Earthdata Login token. The token is obtained once,
//! wrapped in an [`EarthdataSession`] and handed to the adapter; there is no
//! process-wide login state.

use super::error::{FetchError, Result};
use super::http::{encode, get_json};
use super::{AirQualityProvider, seconds};
use crate::config::EarthdataConfig;
use crate::models::{BoundingBox, Coordinate, Observation, Pollutant, Provenance};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument};

const SOURCE: &str = "NASA TEMPO";

/// Nominal surface estimates reported for a covered point, in µg/m³
pub const NOMINAL_ESTIMATES: [(Pollutant, f64); 3] = [
    (Pollutant::No2, 25.0),
    (Pollutant::O3, 60.0),
    (Pollutant::Pm25, 15.0),
];

/// Earthdata Login token response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expiration_date: Option<String>,
}

/// Authenticated Earthdata handle
#[derive(Clone)]
pub struct EarthdataSession {
    access_token: String,
    expiration_date: Option<String>,
}

impl fmt::Debug for EarthdataSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EarthdataSession")
            .field("access_token", &"<redacted>")
            .field("expiration_date", &self.expiration_date)
            .finish()
    }
}

impl EarthdataSession {
    pub fn from_token<S: Into<String>>(access_token: S) -> Self {
        Self {
            access_token: access_token.into(),
            expiration_date: None,
        }
    }

    /// Exchange the configured username/password for a bearer token
    pub async fn login(client: &ClientWithMiddleware, config: &EarthdataConfig) -> Result<Self> {
        let (username, password) = config.credentials().ok_or_else(|| {
            FetchError::Unauthenticated("no Earthdata credentials configured".to_string())
        })?;

        let request = client
            .post(&config.token_url)
            .basic_auth(username, Some(password))
            .timeout(seconds(config.timeout_seconds));
        let token: TokenResponse = get_json(request, "Earthdata Login").await?;

        if token.access_token.trim().is_empty() {
            return Err(FetchError::Unauthenticated(
                "Earthdata Login returned an empty token".to_string(),
            ));
        }

        info!(
            "Earthdata Login succeeded (token type {}, expires {})",
            token.token_type.as_deref().unwrap_or("bearer"),
            token.expiration_date.as_deref().unwrap_or("unknown")
        );

        Ok(Self {
            access_token: token.access_token,
            expiration_date: token.expiration_date,
        })
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

/// CMR granule search response
#[derive(Debug, Deserialize)]
pub struct GranuleSearchResponse {
    pub feed: GranuleFeed,
}

#[derive(Debug, Deserialize)]
pub struct GranuleFeed {
    #[serde(default)]
    pub entry: Vec<Granule>,
}

#[derive(Debug, Deserialize)]
pub struct Granule {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub time_start: Option<String>,
}

/// Nominal observation stamped with the newest granule time, if recent enough
pub fn granule_observation(
    coordinate: Coordinate,
    response: GranuleSearchResponse,
    now: DateTime<Utc>,
    max_age: ChronoDuration,
) -> Result<Observation> {
    let granule_time = response
        .feed
        .entry
        .iter()
        .filter_map(|granule| granule.time_start.as_deref())
        .filter_map(|start| DateTime::parse_from_rfc3339(start).ok())
        .map(|start| start.with_timezone(&Utc))
        .max()
        .ok_or(FetchError::EmptyResult)?;

    if now - granule_time > max_age {
        return Err(FetchError::EmptyResult);
    }

    Ok(NOMINAL_ESTIMATES.iter().fold(
        Observation::new(coordinate, granule_time, Provenance::estimated(SOURCE)),
        |observation, (pollutant, value)| observation.with_reading(*pollutant, *value),
    ))
}

pub struct TempoClient {
    client: ClientWithMiddleware,
    session: Option<EarthdataSession>,
    cmr_url: String,
    collection: String,
    timeout: Duration,
    max_granule_age: ChronoDuration,
}

impl TempoClient {
    pub fn new(
        client: ClientWithMiddleware,
        config: &EarthdataConfig,
        session: Option<EarthdataSession>,
    ) -> Self {
        Self {
            client,
            session,
            cmr_url: config.cmr_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            timeout: seconds(config.timeout_seconds),
            max_granule_age: ChronoDuration::hours(i64::from(config.max_granule_age_hours)),
        }
    }

    fn granules_url(&self, coordinate: &Coordinate) -> String {
        format!(
            "{}/granules.json?short_name={}&point={},{}&sort_key=-start_date&page_size=1",
            self.cmr_url,
            encode(&self.collection),
            coordinate.longitude,
            coordinate.latitude
        )
    }
}

#[async_trait]
impl AirQualityProvider for TempoClient {
    fn name(&self) -> &str {
        SOURCE
    }

    fn coverage(&self) -> Option<BoundingBox> {
        Some(BoundingBox::TEMPO_FIELD_OF_REGARD)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip(self), fields(provider = SOURCE))]
    async fn fetch_current(&self, coordinate: Coordinate) -> Result<Observation> {
        let session = self.session.as_ref().ok_or_else(|| {
            FetchError::Unauthenticated("no Earthdata session available".to_string())
        })?;
        if !BoundingBox::TEMPO_FIELD_OF_REGARD.contains(&coordinate) {
            return Err(FetchError::EmptyResult);
        }

        let request = self
            .client
            .get(self.granules_url(&coordinate))
            .bearer_auth(session.access_token())
            .timeout(self.timeout);
        let response: GranuleSearchResponse = get_json(request, SOURCE).await?;

        let observation =
            granule_observation(coordinate, response, Utc::now(), self.max_granule_age)?;
        info!("TEMPO granule available from {}", observation.timestamp);
        Ok(observation)
    }
}

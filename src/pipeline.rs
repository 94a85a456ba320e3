//! Aggregation pipeline
//!
//! Queries providers in priority order, falls back on failure, fills gaps
//! from the supplementary satellite source and, when nothing answers,
//! synthesizes a deterministic observation. Adapter errors never escape.

use crate::config::SkyForecastConfig;
use crate::error::SkyForecastError;
use crate::models::{Coordinate, DailyAggregate, Observation};
use crate::providers::http::build_client;
use crate::providers::{
    AirNowClient, AirQualityProvider, AirVisualClient, EarthdataSession, FetchError, OpenAqClient,
    OpenAqVersion, OpenWeatherClient, TempoClient, WaqiClient,
};
use crate::synthetic;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

pub type SharedProvider = Arc<dyn AirQualityProvider>;

/// Run one adapter call under its own deadline
async fn bounded<T, F>(
    provider: &dyn AirQualityProvider,
    limit: Duration,
    call: F,
) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        Err(FetchError::NetworkFailure(format!(
            "{} timed out after {}s",
            provider.name(),
            limit.as_secs()
        )))
    })
}

async fn current_from(
    provider: &dyn AirQualityProvider,
    coordinate: Coordinate,
) -> Result<Observation, FetchError> {
    let started = Instant::now();
    let result = bounded(provider, provider.timeout(), provider.fetch_current(coordinate))
        .await
        .and_then(|observation| {
            if observation.has_data() {
                Ok(observation)
            } else {
                Err(FetchError::EmptyResult)
            }
        });

    match &result {
        Ok(_) => info!(
            "{} answered in {:.3}s",
            provider.name(),
            started.elapsed().as_secs_f64()
        ),
        Err(FetchError::Unauthenticated(reason)) => {
            debug!("{} skipped: {}", provider.name(), reason);
        }
        Err(e) => warn!("{} failed: {}", provider.name(), e),
    }
    result
}

pub struct AggregationPipeline {
    /// Variants of the primary provider family, tried in order
    primary: Vec<SharedProvider>,
    /// Independent real-time fallbacks, tried in order
    realtime: Vec<SharedProvider>,
    /// Gap-filling source merged into whatever observation exists
    supplementary: Option<SharedProvider>,
}

impl AggregationPipeline {
    #[must_use]
    pub fn new(
        primary: Vec<SharedProvider>,
        realtime: Vec<SharedProvider>,
        supplementary: Option<SharedProvider>,
    ) -> Self {
        Self {
            primary,
            realtime,
            supplementary,
        }
    }

    /// Wire every configured provider around one shared HTTP client.
    ///
    /// Earthdata Login runs here, once; a failed login only disables TEMPO.
    pub async fn from_config(config: &SkyForecastConfig) -> Result<Self, SkyForecastError> {
        let client = build_client(&config.http)?;
        let providers = &config.providers;

        let primary: Vec<SharedProvider> = [OpenAqVersion::V2, OpenAqVersion::V3]
            .into_iter()
            .map(|version| {
                Arc::new(OpenAqClient::new(client.clone(), &providers.openaq, version))
                    as SharedProvider
            })
            .collect();

        let realtime: Vec<SharedProvider> = vec![
            Arc::new(WaqiClient::new(client.clone(), &providers.waqi)) as SharedProvider,
            Arc::new(OpenWeatherClient::new(client.clone(), &providers.openweather)),
            Arc::new(AirNowClient::new(client.clone(), &providers.airnow)),
            Arc::new(AirVisualClient::new(client.clone(), &providers.airvisual)),
        ];

        let session = match EarthdataSession::login(&client, &providers.earthdata).await {
            Ok(session) => Some(session),
            Err(FetchError::Unauthenticated(reason)) => {
                info!("TEMPO disabled: {}", reason);
                None
            }
            Err(e) => {
                warn!("Earthdata Login failed, TEMPO disabled: {}", e);
                None
            }
        };
        let supplementary: SharedProvider =
            Arc::new(TempoClient::new(client, &providers.earthdata, session));

        Ok(Self::new(primary, realtime, Some(supplementary)))
    }

    /// Combined observation for a coordinate; always answers
    #[instrument(skip(self))]
    pub async fn combined_observation(&self, coordinate: Coordinate) -> Observation {
        let mut base = self.query_primary(coordinate).await;
        if base.is_none() {
            base = self.query_realtime(coordinate).await;
        }
        let supplementary = self.query_supplementary(coordinate).await;

        match (base, supplementary) {
            (Some(mut observation), Some(extra)) => {
                let filled = observation.fill_gaps_from(&extra);
                debug!("Supplementary source filled {} pollutant slots", filled);
                observation
            }
            (Some(observation), None) => observation,
            (None, Some(extra)) => {
                info!(
                    "Only the supplementary source had data for {}",
                    coordinate.format_coordinates()
                );
                extra
            }
            (None, None) => {
                warn!(
                    "No provider returned data for {}, using synthetic estimate",
                    coordinate.format_coordinates()
                );
                synthetic::synthesize(coordinate, Utc::now())
            }
        }
    }

    /// Walk the primary family: transient failures move on to the next
    /// variant, a definitive answer (no data, no credentials) ends the family.
    async fn query_primary(&self, coordinate: Coordinate) -> Option<Observation> {
        for provider in &self.primary {
            match current_from(provider.as_ref(), coordinate).await {
                Ok(observation) => return Some(observation),
                Err(e) if e.is_retryable_with_variant() => continue,
                Err(_) => break,
            }
        }
        None
    }

    async fn query_realtime(&self, coordinate: Coordinate) -> Option<Observation> {
        for provider in &self.realtime {
            if !provider.covers(&coordinate) {
                debug!("{} does not cover {}", provider.name(), coordinate.format_coordinates());
                continue;
            }
            if let Ok(observation) = current_from(provider.as_ref(), coordinate).await {
                return Some(observation);
            }
        }
        None
    }

    async fn query_supplementary(&self, coordinate: Coordinate) -> Option<Observation> {
        let provider = self.supplementary.as_ref()?;
        if !provider.covers(&coordinate) {
            debug!("{} does not cover {}", provider.name(), coordinate.format_coordinates());
            return None;
        }
        current_from(provider.as_ref(), coordinate).await.ok()
    }

    /// Daily means over the last `days` days from the first primary variant
    /// with history; empty when none has any
    #[instrument(skip(self))]
    pub async fn historical(&self, coordinate: Coordinate, days: u32) -> Vec<DailyAggregate> {
        for provider in &self.primary {
            let started = Instant::now();
            let result = bounded(
                provider.as_ref(),
                provider.historical_timeout(),
                provider.fetch_historical(coordinate, days),
            )
            .await;

            match result {
                Ok(observations) => {
                    let source = format!("{} Historical", provider.name());
                    let aggregates = DailyAggregate::from_observations(&observations, &source);
                    if aggregates.is_empty() {
                        continue;
                    }
                    info!(
                        "{} days of history from {} in {:.3}s",
                        aggregates.len(),
                        provider.name(),
                        started.elapsed().as_secs_f64()
                    );
                    return aggregates;
                }
                Err(FetchError::Unauthenticated(reason)) => {
                    debug!("{} history skipped: {}", provider.name(), reason);
                }
                Err(e) => warn!("{} history failed: {}", provider.name(), e),
            }
        }

        warn!("No historical data for {}", coordinate.format_coordinates());
        Vec::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{BoundingBox, Pollutant, ProvenanceKind, Provenance};
    use crate::providers::error;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider recording how often it was called
    pub(crate) struct FakeProvider {
        name: &'static str,
        current: Mutex<Vec<error::Result<Observation>>>,
        history: error::Result<Vec<Observation>>,
        coverage: Option<BoundingBox>,
        delay: Option<Duration>,
        pub(crate) calls: AtomicUsize,
    }

    impl FakeProvider {
        pub(crate) fn new(name: &'static str) -> Self {
            Self {
                name,
                current: Mutex::new(Vec::new()),
                history: Err(FetchError::EmptyResult),
                coverage: None,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn answering(self, result: error::Result<Observation>) -> Self {
            self.current.lock().unwrap().push(result);
            self
        }

        pub(crate) fn with_history(mut self, history: error::Result<Vec<Observation>>) -> Self {
            self.history = history;
            self
        }

        fn covering(mut self, coverage: BoundingBox) -> Self {
            self.coverage = Some(coverage);
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn shared(self) -> Arc<Self> {
            Arc::new(self)
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AirQualityProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn coverage(&self) -> Option<BoundingBox> {
            self.coverage
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(200)
        }

        async fn fetch_current(&self, _coordinate: Coordinate) -> error::Result<Observation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.current
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(FetchError::EmptyResult))
        }

        async fn fetch_historical(
            &self,
            _coordinate: Coordinate,
            _days: u32,
        ) -> error::Result<Vec<Observation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.history.clone()
        }
    }

    pub(crate) fn los_angeles() -> Coordinate {
        Coordinate::new(34.05, -118.24).unwrap()
    }

    pub(crate) fn measured(label: &str, readings: &[(Pollutant, f64)]) -> Observation {
        readings.iter().fold(
            Observation::new(los_angeles(), Utc::now(), Provenance::measured(label)),
            |observation, (pollutant, value)| observation.with_reading(*pollutant, *value),
        )
    }

    fn network_failure() -> error::Result<Observation> {
        Err(FetchError::NetworkFailure("connection reset".to_string()))
    }

    fn as_shared(providers: &[&Arc<FakeProvider>]) -> Vec<SharedProvider> {
        providers
            .iter()
            .map(|p| Arc::clone(*p) as SharedProvider)
            .collect()
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallbacks() {
        let v2 = FakeProvider::new("OpenAQ")
            .answering(Ok(measured("OpenAQ", &[(Pollutant::Pm25, 8.0)])))
            .shared();
        let v3 = FakeProvider::new("OpenAQ v3").shared();
        let waqi = FakeProvider::new("WAQI").shared();

        let pipeline = AggregationPipeline::new(as_shared(&[&v2, &v3]), as_shared(&[&waqi]), None);
        let observation = pipeline.combined_observation(los_angeles()).await;

        assert_eq!(observation.provenance.label, "OpenAQ");
        assert_eq!(v3.call_count(), 0);
        assert_eq!(waqi.call_count(), 0);
    }

    #[tokio::test]
    async fn test_network_failure_falls_through_to_variant() {
        let v2 = FakeProvider::new("OpenAQ").answering(network_failure()).shared();
        let v3 = FakeProvider::new("OpenAQ v3")
            .answering(Ok(measured("OpenAQ v3", &[(Pollutant::O3, 40.0)])))
            .shared();

        let pipeline = AggregationPipeline::new(as_shared(&[&v2, &v3]), Vec::new(), None);
        let observation = pipeline.combined_observation(los_angeles()).await;

        assert_eq!(observation.provenance.label, "OpenAQ v3");
        assert_eq!(observation.concentration(Pollutant::O3), Some(40.0));
    }

    #[tokio::test]
    async fn test_empty_result_abandons_family() {
        let v2 = FakeProvider::new("OpenAQ")
            .answering(Err(FetchError::EmptyResult))
            .shared();
        let v3 = FakeProvider::new("OpenAQ v3")
            .answering(Ok(measured("OpenAQ v3", &[(Pollutant::O3, 40.0)])))
            .shared();
        let waqi = FakeProvider::new("WAQI")
            .answering(Ok(measured("WAQI", &[(Pollutant::Pm10, 30.0)])))
            .shared();

        let pipeline = AggregationPipeline::new(as_shared(&[&v2, &v3]), as_shared(&[&waqi]), None);
        let observation = pipeline.combined_observation(los_angeles()).await;

        assert_eq!(v3.call_count(), 0);
        assert_eq!(observation.provenance.label, "WAQI");
    }

    #[tokio::test]
    async fn test_realtime_chain_stops_at_first_success_and_skips_uncovered() {
        let waqi = FakeProvider::new("WAQI").answering(network_failure()).shared();
        let airnow = FakeProvider::new("AirNow")
            .covering(BoundingBox::CONTINENTAL_US)
            .answering(Ok(measured("AirNow", &[(Pollutant::Pm25, 20.0)])))
            .shared();
        let airvisual = FakeProvider::new("AirVisual")
            .answering(Ok(measured("AirVisual", &[(Pollutant::Pm25, 30.0)])))
            .shared();

        let pipeline =
            AggregationPipeline::new(Vec::new(), as_shared(&[&waqi, &airnow, &airvisual]), None);

        let observation = pipeline.combined_observation(los_angeles()).await;
        assert_eq!(observation.provenance.label, "AirNow");
        assert_eq!(airvisual.call_count(), 0);

        let london = Coordinate::new(51.5, -0.12).unwrap();
        pipeline.combined_observation(london).await;
        assert_eq!(airnow.call_count(), 1);
    }

    #[tokio::test]
    async fn test_supplementary_fills_gaps_only() {
        let v2 = FakeProvider::new("OpenAQ")
            .answering(Ok(measured("OpenAQ", &[(Pollutant::Pm25, 8.0)])))
            .shared();
        let tempo = FakeProvider::new("NASA TEMPO")
            .answering(Ok(Observation::new(
                los_angeles(),
                Utc::now(),
                Provenance::estimated("NASA TEMPO"),
            )
            .with_reading(Pollutant::Pm25, 15.0)
            .with_reading(Pollutant::No2, 25.0)))
            .shared();

        let pipeline = AggregationPipeline::new(
            as_shared(&[&v2]),
            Vec::new(),
            Some(Arc::clone(&tempo) as SharedProvider),
        );
        let observation = pipeline.combined_observation(los_angeles()).await;

        assert_eq!(observation.concentration(Pollutant::Pm25), Some(8.0));
        assert_eq!(observation.concentration(Pollutant::No2), Some(25.0));
        assert_eq!(observation.provenance.label, "OpenAQ + NASA TEMPO");
        assert_eq!(observation.provenance.kind, ProvenanceKind::Estimated);
    }

    #[tokio::test]
    async fn test_supplementary_alone() {
        let tempo = FakeProvider::new("NASA TEMPO")
            .answering(Ok(measured("NASA TEMPO", &[(Pollutant::No2, 25.0)])))
            .shared();
        let pipeline = AggregationPipeline::new(
            Vec::new(),
            Vec::new(),
            Some(Arc::clone(&tempo) as SharedProvider),
        );

        let observation = pipeline.combined_observation(los_angeles()).await;
        assert_eq!(observation.provenance.label, "NASA TEMPO");
    }

    #[tokio::test]
    async fn test_total_failure_synthesizes_deterministically() {
        let build = || {
            let v2 = FakeProvider::new("OpenAQ").answering(network_failure()).shared();
            let waqi = FakeProvider::new("WAQI")
                .answering(Err(FetchError::Unauthenticated("no key".into())))
                .shared();
            AggregationPipeline::new(as_shared(&[&v2]), as_shared(&[&waqi]), None)
        };

        let first = build().combined_observation(los_angeles()).await;
        let second = build().combined_observation(los_angeles()).await;
        let elsewhere = build()
            .combined_observation(Coordinate::new(48.85, 2.35).unwrap())
            .await;

        assert_eq!(first.provenance.kind, ProvenanceKind::Synthetic);
        assert_eq!(first.readings, second.readings);
        assert_ne!(first.readings, elsewhere.readings);
    }

    #[tokio::test]
    async fn test_slow_provider_is_bounded() {
        let slow = FakeProvider::new("OpenAQ")
            .slow(Duration::from_secs(5))
            .answering(Ok(measured("OpenAQ", &[(Pollutant::Pm25, 8.0)])))
            .shared();
        let waqi = FakeProvider::new("WAQI")
            .answering(Ok(measured("WAQI", &[(Pollutant::Pm25, 9.0)])))
            .shared();

        let pipeline = AggregationPipeline::new(as_shared(&[&slow]), as_shared(&[&waqi]), None);
        let started = Instant::now();
        let observation = pipeline.combined_observation(los_angeles()).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(observation.provenance.label, "WAQI");
    }

    #[tokio::test]
    async fn test_historical_groups_by_day_and_falls_through() {
        let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap();
        let reading = |d, h, value| {
            Observation::new(los_angeles(), day(d, h), Provenance::measured("OpenAQ v3"))
                .with_reading(Pollutant::Pm25, value)
        };

        let v2 = FakeProvider::new("OpenAQ")
            .with_history(Err(FetchError::NetworkFailure("502".into())))
            .shared();
        let v3 = FakeProvider::new("OpenAQ v3")
            .with_history(Ok(vec![
                reading(1, 1, 10.0),
                reading(1, 23, 20.0),
                reading(2, 0, 7.0),
            ]))
            .shared();

        let pipeline = AggregationPipeline::new(as_shared(&[&v2, &v3]), Vec::new(), None);
        let history = pipeline.historical(los_angeles(), 7).await;

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].means[&Pollutant::Pm25], 15.0);
        assert_eq!(history[1].means[&Pollutant::Pm25], 7.0);
        assert_eq!(history[0].source, "OpenAQ v3 Historical");
    }

    #[tokio::test]
    async fn test_historical_empty_when_nothing_answers() {
        let v2 = FakeProvider::new("OpenAQ").shared();
        let pipeline = AggregationPipeline::new(as_shared(&[&v2]), Vec::new(), None);
        assert!(pipeline.historical(los_angeles(), 7).await.is_empty());
    }
}

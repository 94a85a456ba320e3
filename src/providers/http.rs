//! Shared HTTP plumbing for provider adapters

use super::error::{FetchError, Result};
use crate::config::HttpConfig;
use crate::error::SkyForecastError;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::debug;

/// Build the single client every adapter shares.
///
/// Transient failures (connect errors, 5xx, 429) are retried with
/// exponential backoff; each adapter still bounds the whole call with its
/// own request timeout.
pub fn build_client(config: &HttpConfig) -> std::result::Result<ClientWithMiddleware, SkyForecastError> {
    let inner = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| SkyForecastError::http(format!("Failed to create HTTP client: {e}")))?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);

    Ok(ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Map a non-success status onto the adapter failure taxonomy
#[must_use]
pub fn status_to_error(status: StatusCode, provider: &str) -> FetchError {
    match status.as_u16() {
        401 | 403 => FetchError::Unauthenticated(format!("{provider} rejected the credentials ({status})")),
        404 => FetchError::EmptyResult,
        _ => FetchError::NetworkFailure(format!("{provider} returned {status}")),
    }
}

/// Decode a response body, mapping malformed payloads to `ParseFailure`
pub fn decode<T: DeserializeOwned>(body: &str, provider: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::ParseFailure(format!("Failed to parse {provider} response: {e}")))
}

/// Send a request and decode its JSON body
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder, provider: &str) -> Result<T> {
    let started = Instant::now();

    let response = request
        .send()
        .await
        .map_err(|e| FetchError::NetworkFailure(format!("{provider} request failed: {e}")))?;

    let status = response.status();
    debug!(
        "{} responded {} in {:.3}s",
        provider,
        status,
        started.elapsed().as_secs_f64()
    );

    if !status.is_success() {
        return Err(status_to_error(status, provider));
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::NetworkFailure(format!("{provider} body read failed: {e}")))?;

    decode(&body, provider)
}

/// Percent-encode a query value
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::Deserialize;

    #[rstest]
    #[case(StatusCode::UNAUTHORIZED, FetchError::Unauthenticated(String::new()))]
    #[case(StatusCode::FORBIDDEN, FetchError::Unauthenticated(String::new()))]
    #[case(StatusCode::NOT_FOUND, FetchError::EmptyResult)]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, FetchError::NetworkFailure(String::new()))]
    #[case(StatusCode::TOO_MANY_REQUESTS, FetchError::NetworkFailure(String::new()))]
    fn test_status_mapping(#[case] status: StatusCode, #[case] expected: FetchError) {
        let error = status_to_error(status, "OpenAQ");
        assert_eq!(
            std::mem::discriminant(&error),
            std::mem::discriminant(&expected)
        );
    }

    #[derive(Debug, Deserialize)]
    struct Payload {
        results: Vec<u32>,
    }

    #[test]
    fn test_decode_maps_errors() {
        let payload: Payload = decode(r#"{"results": [1, 2]}"#, "OpenAQ").unwrap();
        assert_eq!(payload.results, vec![1, 2]);

        let error = decode::<Payload>("<html>Bad gateway</html>", "OpenAQ").unwrap_err();
        assert!(matches!(error, FetchError::ParseFailure(ref msg) if msg.contains("OpenAQ")));
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(&HttpConfig::default()).is_ok());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode("2024-03-01T00:00:00Z"), "2024-03-01T00%3A00%3A00Z");
    }
}

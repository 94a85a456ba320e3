//! Error types and handling for the Sky Forecaster engine

use crate::aqi::AqiError;
use crate::units::NormalizeError;
use crate::models::Pollutant;
use thiserror::Error;

/// Main error type surfaced to callers of the service
#[derive(Error, Debug)]
pub enum SkyForecastError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Coordinates outside the WGS84 ranges
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// Forecast horizon outside 1..=168 hours
    #[error("Invalid forecast horizon: {hours} hours (must be 1-168)")]
    InvalidHorizon { hours: u32 },

    /// Direct sub-index request for a pollutant without a breakpoint table
    #[error("Unknown pollutant: {pollutant}")]
    UnknownPollutant { pollutant: Pollutant },

    /// Client-supplied concentration that cannot be indexed
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// HTTP client construction errors
    #[error("HTTP client error: {message}")]
    Http { message: String },
}

impl SkyForecastError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new HTTP client error
    pub fn http<S: Into<String>>(message: S) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SkyForecastError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            SkyForecastError::InvalidCoordinate { .. } => {
                "Invalid coordinates. Latitude must be -90..90 and longitude -180..180.".to_string()
            }
            SkyForecastError::InvalidHorizon { .. } => {
                "Invalid hours parameter (1-168)".to_string()
            }
            SkyForecastError::UnknownPollutant { pollutant } => {
                format!("No AQI breakpoints are defined for {pollutant}")
            }
            SkyForecastError::InvalidInput { message } => {
                format!("Invalid pollutant value: {message}")
            }
            SkyForecastError::Http { .. } => {
                "Unable to set up connections to air quality providers.".to_string()
            }
        }
    }
}

impl From<AqiError> for SkyForecastError {
    fn from(err: AqiError) -> Self {
        match err {
            AqiError::UnknownPollutant(pollutant) => Self::UnknownPollutant { pollutant },
        }
    }
}

impl From<NormalizeError> for SkyForecastError {
    fn from(err: NormalizeError) -> Self {
        Self::InvalidInput {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = SkyForecastError::config("missing API key");
        assert!(matches!(config_err, SkyForecastError::Config { .. }));

        let http_err = SkyForecastError::http("tls backend unavailable");
        assert!(matches!(http_err, SkyForecastError::Http { .. }));
    }

    #[test]
    fn test_user_messages() {
        let config_err = SkyForecastError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        let horizon_err = SkyForecastError::InvalidHorizon { hours: 200 };
        assert!(horizon_err.user_message().contains("1-168"));
        assert!(horizon_err.to_string().contains("200"));
    }

    #[test]
    fn test_normalize_error_conversion() {
        let err: SkyForecastError = NormalizeError::NonFinite {
            pollutant: Pollutant::Pm25,
        }
        .into();
        assert!(matches!(err, SkyForecastError::InvalidInput { .. }));
        assert!(err.user_message().contains("pm25"));
    }

    #[test]
    fn test_aqi_error_conversion() {
        let err: SkyForecastError = AqiError::UnknownPollutant(Pollutant::So2).into();
        assert!(matches!(
            err,
            SkyForecastError::UnknownPollutant {
                pollutant: Pollutant::So2
            }
        ));
        assert!(err.user_message().contains("so2"));
    }
}

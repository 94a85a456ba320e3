//! Configuration management for the Sky Forecaster engine
//!
//! Handles loading configuration from files and environment variables,
//! and provides validation for all configuration settings. Provider
//! credentials are optional: a provider without one is disabled, not an error.

use crate::SkyForecastError;
use crate::models::BoundingBox;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyForecastConfig {
    /// Upstream provider settings
    pub providers: ProvidersConfig,
    /// Shared HTTP client settings
    pub http: HttpConfig,
    /// Forecast settings
    pub forecast: ForecastConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openaq: OpenAqConfig,
    pub waqi: WaqiConfig,
    pub openweather: OpenWeatherConfig,
    pub airnow: AirNowConfig,
    pub airvisual: AirVisualConfig,
    pub earthdata: EarthdataConfig,
}

/// OpenAQ measurement network (primary family: v2, then v3)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAqConfig {
    /// Optional for v2, required for v3
    pub api_key: Option<String>,
    pub v2_base_url: String,
    pub v3_base_url: String,
    /// Search radius for current conditions in meters
    pub radius_meters: u32,
    /// Search radius for historical queries in meters
    pub historical_radius_meters: u32,
    pub timeout_seconds: u32,
    pub historical_timeout_seconds: u32,
}

/// World Air Quality Index project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaqiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u32,
}

/// OpenWeatherMap air pollution API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenWeatherConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u32,
}

/// AirNow (US only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AirNowConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u32,
    /// Station search distance in miles
    pub distance_miles: u32,
    /// Area outside of which AirNow is never queried
    pub coverage: BoundingBox,
}

/// AirVisual nearest-city API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AirVisualConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u32,
}

/// NASA Earthdata credentials and endpoints for TEMPO
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthdataConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub token_url: String,
    pub cmr_url: String,
    pub collection: String,
    pub timeout_seconds: u32,
    /// Granules older than this are not considered current
    pub max_granule_age_hours: u32,
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Retries for transient failures, per request
    pub max_retries: u32,
}

/// Forecast settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Days of history used as the forecast baseline
    pub history_days: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

// Default value functions
fn default_provider_timeout() -> u32 {
    10
}

fn default_openaq_timeout() -> u32 {
    30
}

fn default_openaq_historical_timeout() -> u32 {
    60
}

fn default_openaq_radius() -> u32 {
    10_000
}

fn default_openaq_historical_radius() -> u32 {
    50_000
}

fn default_airnow_distance() -> u32 {
    25
}

fn default_earthdata_timeout() -> u32 {
    30
}

fn default_granule_age() -> u32 {
    72
}

fn default_user_agent() -> String {
    format!("SkyForecaster/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_retries() -> u32 {
    2
}

fn default_history_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for OpenAqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            v2_base_url: "https://api.openaq.org/v2".to_string(),
            v3_base_url: "https://api.openaq.org/v3".to_string(),
            radius_meters: default_openaq_radius(),
            historical_radius_meters: default_openaq_historical_radius(),
            timeout_seconds: default_openaq_timeout(),
            historical_timeout_seconds: default_openaq_historical_timeout(),
        }
    }
}

impl Default for WaqiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.waqi.info/feed".to_string(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl Default for AirNowConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.airnowapi.org/aq/observation".to_string(),
            timeout_seconds: default_provider_timeout(),
            distance_miles: default_airnow_distance(),
            coverage: BoundingBox::CONTINENTAL_US,
        }
    }
}

impl Default for AirVisualConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.airvisual.com/v2".to_string(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

impl Default for EarthdataConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            token_url: "https://urs.earthdata.nasa.gov/api/users/find_or_create_token".to_string(),
            cmr_url: "https://cmr.earthdata.nasa.gov/search".to_string(),
            collection: "TEMPO_NO2_L3".to_string(),
            timeout_seconds: default_earthdata_timeout(),
            max_granule_age_hours: default_granule_age(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Treat empty strings from files or the environment as "not configured"
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl EarthdataConfig {
    /// Username and password, when both are configured
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.username)?, non_empty(&self.password)?))
    }
}

impl SkyForecastConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. SKYFORECAST_PROVIDERS__WAQI__API_KEY
        builder = builder.add_source(
            Environment::with_prefix("SKYFORECAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: SkyForecastConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("skyforecaster").join("config.toml"))
    }

    /// Apply default values to zeroed or empty configuration fields
    pub fn apply_defaults(&mut self) {
        let providers = &mut self.providers;
        if providers.openaq.timeout_seconds == 0 {
            providers.openaq.timeout_seconds = default_openaq_timeout();
        }
        if providers.openaq.historical_timeout_seconds == 0 {
            providers.openaq.historical_timeout_seconds = default_openaq_historical_timeout();
        }
        if providers.openaq.radius_meters == 0 {
            providers.openaq.radius_meters = default_openaq_radius();
        }
        if providers.openaq.historical_radius_meters == 0 {
            providers.openaq.historical_radius_meters = default_openaq_historical_radius();
        }
        for timeout in [
            &mut providers.waqi.timeout_seconds,
            &mut providers.openweather.timeout_seconds,
            &mut providers.airnow.timeout_seconds,
            &mut providers.airvisual.timeout_seconds,
        ] {
            if *timeout == 0 {
                *timeout = default_provider_timeout();
            }
        }
        if providers.airnow.distance_miles == 0 {
            providers.airnow.distance_miles = default_airnow_distance();
        }
        if providers.earthdata.timeout_seconds == 0 {
            providers.earthdata.timeout_seconds = default_earthdata_timeout();
        }
        if providers.earthdata.max_granule_age_hours == 0 {
            providers.earthdata.max_granule_age_hours = default_granule_age();
        }
        if self.http.user_agent.is_empty() {
            self.http.user_agent = default_user_agent();
        }
        if self.forecast.history_days == 0 {
            self.forecast.history_days = default_history_days();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_coverage()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        let providers = &self.providers;
        let timeouts = [
            ("openaq", providers.openaq.timeout_seconds),
            ("openaq historical", providers.openaq.historical_timeout_seconds),
            ("waqi", providers.waqi.timeout_seconds),
            ("openweather", providers.openweather.timeout_seconds),
            ("airnow", providers.airnow.timeout_seconds),
            ("airvisual", providers.airvisual.timeout_seconds),
            ("earthdata", providers.earthdata.timeout_seconds),
        ];

        for (name, seconds) in timeouts {
            if !(1..=300).contains(&seconds) {
                return Err(SkyForecastError::config(format!(
                    "{name} timeout must be between 1 and 300 seconds, got {seconds}"
                ))
                .into());
            }
        }

        if self.http.max_retries > 10 {
            return Err(SkyForecastError::config("HTTP max retries cannot exceed 10").into());
        }

        if !(1..=30).contains(&self.forecast.history_days) {
            return Err(SkyForecastError::config(
                "Forecast history must be between 1 and 30 days",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(SkyForecastError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(SkyForecastError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let providers = &self.providers;
        let urls = [
            &providers.openaq.v2_base_url,
            &providers.openaq.v3_base_url,
            &providers.waqi.base_url,
            &providers.openweather.base_url,
            &providers.airnow.base_url,
            &providers.airvisual.base_url,
            &providers.earthdata.token_url,
            &providers.earthdata.cmr_url,
        ];
        for url in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SkyForecastError::config(format!(
                    "Provider URL must be a valid HTTP or HTTPS URL: '{url}'"
                ))
                .into());
            }
        }

        Ok(())
    }

    fn validate_coverage(&self) -> Result<()> {
        if !self.providers.airnow.coverage.is_well_formed() {
            return Err(SkyForecastError::config(
                "AirNow coverage box must have ordered bounds within -90..90 / -180..180",
            )
            .into());
        }
        Ok(())
    }
}

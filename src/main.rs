//! Sky Forecaster CLI - current air quality, forecasts and AQI calculation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use skyforecaster::config::SkyForecastConfig;
use skyforecaster::report::{AirQualityReport, AqiReport, ForecastReport};
use skyforecaster::service::AirQualityService;
use skyforecaster::telemetry::init_tracing;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "skyforecaster",
    version,
    about = "Multi-source air quality lookup and forecasting"
)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Current air quality at a coordinate
    #[command(allow_negative_numbers = true)]
    Current { latitude: f64, longitude: f64 },

    /// Forecast in six-hour steps
    #[command(allow_negative_numbers = true)]
    Forecast {
        latitude: f64,
        longitude: f64,
        /// Horizon in hours (1-168)
        #[arg(default_value_t = 24)]
        hours: u32,
    },

    /// AQI for given concentrations in µg/m³, e.g. `pm25=35.5 o3=null`
    Aqi {
        #[arg(required = true, value_parser = parse_pollutant_value)]
        pollutants: Vec<(String, Option<f64>)>,
    },
}

fn parse_pollutant_value(arg: &str) -> Result<(String, Option<f64>), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{arg}'"))?;
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(format!("missing pollutant name in '{arg}'"));
    }

    let value = match value.trim() {
        "" | "null" | "none" => None,
        number => Some(
            number
                .parse::<f64>()
                .map_err(|_| format!("'{number}' is not a number"))?,
        ),
    };
    Ok((name, value))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render result")?;
    println!("{rendered}");
    Ok(())
}

fn user_error(e: skyforecaster::SkyForecastError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

/// Load configuration, install logging and wire the providers
async fn connect(config_path: Option<PathBuf>) -> Result<AirQualityService> {
    let config = SkyForecastConfig::load_from_path(config_path)?;
    init_tracing(&config.logging)?;
    AirQualityService::from_config(&config)
        .await
        .map_err(user_error)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Current {
            latitude,
            longitude,
        } => {
            let service = connect(cli.config).await?;
            let result = service
                .current_conditions(latitude, longitude)
                .await
                .map_err(user_error)?;
            print_json(&AirQualityReport::from(&result))
        }
        Command::Forecast {
            latitude,
            longitude,
            hours,
        } => {
            let service = connect(cli.config).await?;
            let series = service
                .forecast(latitude, longitude, hours)
                .await
                .map_err(user_error)?;
            print_json(&ForecastReport::from(&series))
        }
        // Direct calculation needs neither providers nor logging
        Command::Aqi { pollutants } => {
            let pollutants: BTreeMap<String, Option<f64>> = pollutants.into_iter().collect();
            let result = AirQualityService::calculate_aqi(&pollutants).map_err(user_error)?;
            print_json(&AqiReport::new(&result, pollutants))
        }
    }
}

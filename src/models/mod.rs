//! Data models for the Sky Forecaster engine
//!
//! This module contains the core domain models organized by concern:
//! - Coordinate: validated geographic points and coverage boxes
//! - Pollutant: pollutant taxonomy, units and readings
//! - Observation: normalized provider output with weather and provenance
//! - History: daily aggregates derived from historical readings

pub mod coordinate;
pub mod history;
pub mod observation;
pub mod pollutant;

// Re-export all public types for convenient access
pub use coordinate::{BoundingBox, Coordinate};
pub use history::DailyAggregate;
pub use observation::{Observation, Provenance, ProvenanceKind, WeatherSnapshot};
pub use pollutant::{Pollutant, PollutantReading, Unit, UnrecognizedPollutant};

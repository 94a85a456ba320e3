//! Air Quality Index engine
//!
//! Pure functions turning pollutant concentrations (µg/m³) into a 0-500
//! index: per-pollutant sub-indices, the overall index with its primary
//! pollutant, and the category/colour bands used for display.

pub mod breakpoints;

use crate::models::Pollutant;
use breakpoints::{Breakpoint, INDEX_CEILING};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised by direct sub-index calculation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AqiError {
    #[error("No breakpoint table for pollutant: {0}")]
    UnknownPollutant(Pollutant),
}

/// Sub-index of a single pollutant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollutantIndex {
    pub index: u16,
    pub pollutant: Pollutant,
}

/// Overall index and the pollutant driving it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverallIndex {
    pub index: u16,
    /// `None` when no pollutant produced a positive sub-index ("unknown")
    pub primary_pollutant: Option<Pollutant>,
}

fn interpolate(band: &Breakpoint, concentration: f64) -> u16 {
    // Gap values between bands start at this band's lower edge
    let concentration = concentration.max(band.concentration_low);
    let index_span = f64::from(band.index_high - band.index_low);
    let concentration_span = band.concentration_high - band.concentration_low;
    let index = (index_span / concentration_span) * (concentration - band.concentration_low)
        + f64::from(band.index_low);

    // Bounded by the band's own index range, so the cast cannot truncate
    index.round().clamp(0.0, f64::from(INDEX_CEILING)) as u16
}

/// Compute the sub-index of one pollutant.
///
/// Concentrations above the table's highest band clamp to 500. Negative and
/// non-finite inputs are expected to have been rejected by the unit normalizer.
pub fn compute_index(pollutant: Pollutant, concentration: f64) -> Result<PollutantIndex, AqiError> {
    let table = breakpoints::table_for(pollutant).ok_or(AqiError::UnknownPollutant(pollutant))?;

    let index = table
        .iter()
        .find(|band| concentration <= band.concentration_high)
        .map_or(INDEX_CEILING, |band| interpolate(band, concentration));

    Ok(PollutantIndex { index, pollutant })
}

/// Overall index: the maximum sub-index across all reported pollutants.
///
/// Only strictly positive values are considered; pollutants without a table
/// are skipped. Ties go to the first pollutant reaching the maximum in
/// iteration order, so callers should pass an ordered collection.
pub fn compute_overall_index<I>(concentrations: I) -> OverallIndex
where
    I: IntoIterator<Item = (Pollutant, Option<f64>)>,
{
    let mut overall = OverallIndex {
        index: 0,
        primary_pollutant: None,
    };

    for (pollutant, concentration) in concentrations {
        let Some(value) = concentration.filter(|v| *v > 0.0) else {
            continue;
        };

        match compute_index(pollutant, value) {
            Ok(sub_index) if sub_index.index > overall.index => {
                overall = OverallIndex {
                    index: sub_index.index,
                    primary_pollutant: Some(pollutant),
                };
            }
            Ok(_) => {}
            Err(e) => tracing::trace!("Skipping {}: {}", pollutant, e),
        }
    }

    overall
}

/// Invert a breakpoint table: the concentration at which `pollutant` reaches `index`.
///
/// Used to turn index-only provider readings back into concentrations. The
/// result is an approximation and should be treated as estimated data.
pub fn concentration_for_index(pollutant: Pollutant, index: f64) -> Result<f64, AqiError> {
    let table = breakpoints::table_for(pollutant).ok_or(AqiError::UnknownPollutant(pollutant))?;
    let index = index.max(0.0);

    let band = table
        .iter()
        .find(|band| index <= f64::from(band.index_high))
        .unwrap_or(&table[table.len() - 1]);

    let index = index.clamp(f64::from(band.index_low), f64::from(band.index_high));
    let index_span = f64::from(band.index_high - band.index_low);
    let concentration_span = band.concentration_high - band.concentration_low;

    Ok((index - f64::from(band.index_low)) * concentration_span / index_span
        + band.concentration_low)
}

/// Health category bands of the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    #[must_use]
    pub fn from_index(index: u16) -> Self {
        match index {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthySensitive,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    #[must_use]
    pub fn color(&self) -> Rgb {
        match self {
            AqiCategory::Good => Rgb(0x00, 0xe4, 0x00),
            AqiCategory::Moderate => Rgb(0xff, 0xff, 0x00),
            AqiCategory::UnhealthySensitive => Rgb(0xff, 0x7e, 0x00),
            AqiCategory::Unhealthy => Rgb(0xff, 0x00, 0x00),
            AqiCategory::VeryUnhealthy => Rgb(0x8f, 0x3f, 0x97),
            AqiCategory::Hazardous => Rgb(0x7e, 0x00, 0x23),
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display colour of a category, rendered as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[must_use]
pub fn category_of(index: u16) -> AqiCategory {
    AqiCategory::from_index(index)
}

#[must_use]
pub fn color_of(index: u16) -> Rgb {
    AqiCategory::from_index(index).color()
}

/// Fully derived index for an observation or a client-supplied set of values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AqiResult {
    pub index: u16,
    pub primary_pollutant: Option<Pollutant>,
    pub category: AqiCategory,
    pub color: Rgb,
}

impl AqiResult {
    pub fn from_concentrations<I>(concentrations: I) -> Self
    where
        I: IntoIterator<Item = (Pollutant, Option<f64>)>,
    {
        let overall = compute_overall_index(concentrations);
        let category = AqiCategory::from_index(overall.index);
        Self {
            index: overall.index,
            primary_pollutant: overall.primary_pollutant,
            category,
            color: category.color(),
        }
    }

    /// Primary pollutant key, or "unknown" when nothing drove the index
    #[must_use]
    pub fn primary_pollutant_label(&self) -> &'static str {
        self.primary_pollutant.map_or("unknown", |p| p.key())
    }
}

/// Index for client-supplied values keyed by pollutant name.
///
/// Names outside the taxonomy are skipped rather than rejected.
#[must_use]
pub fn calculate_aqi_named(values: &BTreeMap<String, Option<f64>>) -> AqiResult {
    let mut known: BTreeMap<Pollutant, Option<f64>> = BTreeMap::new();
    for (name, value) in values {
        match name.parse::<Pollutant>() {
            Ok(pollutant) => {
                known.insert(pollutant, *value);
            }
            Err(e) => tracing::debug!("Ignoring client value: {}", e),
        }
    }
    AqiResult::from_concentrations(known)
}

//! Geographic coordinate and coverage box models

use crate::error::SkyForecastError;
use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};

/// A validated point on the globe
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside the WGS84 ranges
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SkyForecastError> {
        if !latitude.is_finite()
            || !longitude.is_finite()
            || !(-90.0..=90.0).contains(&latitude)
            || !(-180.0..=180.0).contains(&longitude)
        {
            return Err(SkyForecastError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Format coordinate as a short string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Great-circle distance to another point in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        let from = HaversineLocation {
            latitude: self.latitude,
            longitude: self.longitude,
        };
        let to = HaversineLocation {
            latitude: other.latitude,
            longitude: other.longitude,
        };
        distance(from, to, Units::Kilometers)
    }
}

/// Rectangular latitude/longitude area a regional provider covers
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Continental United States, as served by AirNow
    pub const CONTINENTAL_US: BoundingBox = BoundingBox {
        min_latitude: 25.0,
        max_latitude: 49.0,
        min_longitude: -125.0,
        max_longitude: -66.0,
    };

    /// TEMPO geostationary field of regard over North America
    pub const TEMPO_FIELD_OF_REGARD: BoundingBox = BoundingBox {
        min_latitude: 14.0,
        max_latitude: 63.0,
        min_longitude: -140.0,
        max_longitude: -50.0,
    };

    #[must_use]
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&coordinate.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&coordinate.longitude)
    }

    /// A box is well formed when both ranges are ordered and inside WGS84 bounds
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.min_latitude <= self.max_latitude
            && self.min_longitude <= self.max_longitude
            && self.min_latitude >= -90.0
            && self.max_latitude <= 90.0
            && self.min_longitude >= -180.0
            && self.max_longitude <= 180.0
    }
}

//! Piecewise-linear concentration to index tables (US EPA style).
//!
//! Concentrations are in µg/m³ for every table. Bands are listed in
//! ascending order; adjacent bands may leave a small gap between one band's
//! upper edge and the next band's lower edge, which the engine assigns to
//! the upper band.

use crate::models::Pollutant;

/// One band of a breakpoint table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub concentration_low: f64,
    pub concentration_high: f64,
    pub index_low: u16,
    pub index_high: u16,
}

const fn band(
    concentration_low: f64,
    concentration_high: f64,
    index_low: u16,
    index_high: u16,
) -> Breakpoint {
    Breakpoint {
        concentration_low,
        concentration_high,
        index_low,
        index_high,
    }
}

/// Highest value on the index scale
pub const INDEX_CEILING: u16 = 500;

pub static PM25: [Breakpoint; 6] = [
    band(0.0, 12.0, 0, 50),
    band(12.1, 35.4, 51, 100),
    band(35.5, 55.4, 101, 150),
    band(55.5, 150.4, 151, 200),
    band(150.5, 250.4, 201, 300),
    band(250.5, 500.4, 301, 500),
];

pub static PM10: [Breakpoint; 6] = [
    band(0.0, 54.0, 0, 50),
    band(55.0, 154.0, 51, 100),
    band(155.0, 254.0, 101, 150),
    band(255.0, 354.0, 151, 200),
    band(355.0, 424.0, 201, 300),
    band(425.0, 604.0, 301, 500),
];

pub static NO2: [Breakpoint; 6] = [
    band(0.0, 53.0, 0, 50),
    band(54.0, 100.0, 51, 100),
    band(101.0, 360.0, 101, 150),
    band(361.0, 649.0, 151, 200),
    band(650.0, 1249.0, 201, 300),
    band(1250.0, 2049.0, 301, 500),
];

pub static O3: [Breakpoint; 6] = [
    band(0.0, 54.0, 0, 50),
    band(55.0, 70.0, 51, 100),
    band(71.0, 85.0, 101, 150),
    band(86.0, 105.0, 151, 200),
    band(106.0, 200.0, 201, 300),
    band(201.0, 400.0, 301, 500),
];

/// Table for a pollutant; CO and SO2 have none
#[must_use]
pub fn table_for(pollutant: Pollutant) -> Option<&'static [Breakpoint]> {
    match pollutant {
        Pollutant::Pm25 => Some(PM25.as_slice()),
        Pollutant::Pm10 => Some(PM10.as_slice()),
        Pollutant::No2 => Some(NO2.as_slice()),
        Pollutant::O3 => Some(O3.as_slice()),
        Pollutant::Co | Pollutant::So2 => None,
    }
}

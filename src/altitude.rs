//! Pressure altitude helpers
//!
//! Copyright 2019 Ryan Kurte

/// Standard sea level pressure in millibar
pub const STANDARD_PRESSURE: f32 = 1013.25;

/// Convert a pressure to altitude in meters using the barometric formula for the troposphere
///
/// With `sea_level_pressure` set to [`STANDARD_PRESSURE`] this gives the pressure altitude,
/// substituting the local pressure corrected to sea level (eg. from a METAR altimeter setting)
/// gives the actual altitude. Both pressures must be in the same units.
pub fn pressure_altitude(pressure: f32, sea_level_pressure: f32) -> f32 {
    44330.76923 * (1.0 - (pressure / sea_level_pressure).powf(0.190264))
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Raw sensor value conversions for ROBOTIS hardware.
//!
//! Sensor reports arrive in the state tree as raw ADC readings. The distance
//! curves were fitted against a white A4 card held at known distances, so
//! readings outside the calibrated range are rejected rather than
//! extrapolated. Results are rounded to one decimal place.

#![allow(clippy::excessive_precision)]

use crate::error::{Error, Result};

/// IR sensor IRSS-10, distance in cm (approx. 3 to 30 cm).
pub fn irss10_distance(raw: u16) -> Result<f64> {
    check_range(raw, 26, 713)?;
    Ok(round1(214.32803656545 * f64::from(raw).powf(-0.60223538294025299184)))
}

/// IR sensor DMS-80, distance in cm (8 to 80 cm).
pub fn dms80_distance(raw: u16) -> Result<f64> {
    check_range(raw, 111, 740)?;
    Ok(round1(19490.373230416 * f64::from(raw).powf(-1.16498805911575493846)))
}

/// Temperature sensor TPS-10, degrees Celsius.
pub fn tps10_temperature(raw: u16) -> f64 {
    round1(0.1179268 * f64::from(raw) - 34.86361)
}

/// Touch sensor TS-10. 1 while the micro-switch is depressed.
pub fn ts10_touch(raw: u16) -> u8 {
    u8::from(raw > 0)
}

/// Magnetic sensor MGSS-10. 1 while a magnet is present.
pub fn mgss10_magnet(raw: u16) -> u8 {
    u8::from(raw > 0)
}

/// Servo motor SM-10, angle from 0 to 300 degrees.
///
/// The SM-10 reports 64..=959 rather than the full 0..=1023 span.
pub fn sm10_angle(raw: u16) -> Result<f64> {
    check_range(raw, 64, 959)?;
    Ok(round1(300.0 * f64::from(raw - 64) / 895.0))
}

/// Internal IR sensor of the CM-150 Dream controller, distance in cm.
pub fn cm150_distance(raw: u16) -> Result<f64> {
    check_range(raw, 26, 681)?;
    Ok(round1(108.47751089561 * f64::from(raw).powf(-0.51378200718609424542)))
}

/// Internal IR sensor of the CM-50 Play controller, distance in cm.
///
/// Same optics as the CM-150.
pub fn cm50_distance(raw: u16) -> Result<f64> {
    cm150_distance(raw)
}

fn check_range(raw: u16, min: u16, max: u16) -> Result<()> {
    if (min..=max).contains(&raw) {
        Ok(())
    } else {
        Err(Error::OutOfRange { raw, min, max })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
#[path = "sensor_tests.rs"]
mod tests;

//! Decoding of raw meter data points into typed readings.
//!
//! The meters report integer point values in fixed sub-unit scales
//! (milliamps, centi-kWh, deciwatts). Decoding is total: an absent point
//! decodes as raw zero, a non-numeric point value decodes as the missing
//! sentinel, and nothing here ever fails.

use std::collections::HashMap;

use types::{DeviceReading, RawValue};

pub const DP_FORWARD_ENERGY_TOTAL: &str = "1";
pub const DP_REVERSE_ENERGY_TOTAL: &str = "2";
pub const DP_VOLTAGE: &str = "101";
pub const DP_FREQUENCY: &str = "102";
pub const DP_TOTAL_POWER: &str = "103";
pub const DP_POWER_FACTOR_A: &str = "104";
pub const DP_CURRENT_A: &str = "105";
pub const DP_POWER_A: &str = "106";
pub const DP_ENERGY_FORWARD_A: &str = "107";
pub const DP_ENERGY_REVERSE_A: &str = "108";
pub const DP_POWER_FACTOR_B: &str = "109";
pub const DP_CURRENT_B: &str = "110";
pub const DP_POWER_B: &str = "111";
pub const DP_ENERGY_FORWARD_B: &str = "112";
pub const DP_ENERGY_REVERSE_B: &str = "113";
pub const DP_DIRECTION_CURRENT_A: &str = "124";
pub const DP_DIRECTION_CURRENT_B: &str = "125";

const MILLI: f64 = 1000.0;
const CENTI: f64 = 100.0;
const DECI: f64 = 10.0;

/// Decode one status point map into a reading, applying per-field scales.
pub fn decode(points: &HashMap<String, RawValue>) -> DeviceReading {
    DeviceReading {
        current_a: scaled(points, DP_CURRENT_A, MILLI),
        current_b: scaled(points, DP_CURRENT_B, MILLI),
        direction_current_a: unscaled(points, DP_DIRECTION_CURRENT_A),
        direction_current_b: unscaled(points, DP_DIRECTION_CURRENT_B),
        energy_forward_a: scaled(points, DP_ENERGY_FORWARD_A, CENTI),
        energy_forward_b: scaled(points, DP_ENERGY_FORWARD_B, CENTI),
        energy_reverse_a: scaled(points, DP_ENERGY_REVERSE_A, CENTI),
        energy_reverse_b: scaled(points, DP_ENERGY_REVERSE_B, CENTI),
        power_a: scaled(points, DP_POWER_A, DECI),
        power_b: scaled(points, DP_POWER_B, DECI),
        power_factor_a: scaled(points, DP_POWER_FACTOR_A, CENTI),
        power_factor_b: scaled(points, DP_POWER_FACTOR_B, CENTI),
        forward_energy_total: scaled(points, DP_FORWARD_ENERGY_TOTAL, CENTI),
        reverse_energy_total: scaled(points, DP_REVERSE_ENERGY_TOTAL, CENTI),
        total_power: scaled(points, DP_TOTAL_POWER, DECI),
        frequency: scaled(points, DP_FREQUENCY, CENTI),
        voltage: scaled(points, DP_VOLTAGE, DECI),
    }
}

fn scaled(points: &HashMap<String, RawValue>, key: &str, divisor: f64) -> f64 {
    match points.get(key) {
        None => 0.0,
        Some(value) => match value.as_f64() {
            Some(raw) => raw / divisor,
            None => f64::NAN,
        },
    }
}

/// Direction points carry a bare 0/1 and take no scaling.
fn unscaled(points: &HashMap<String, RawValue>, key: &str) -> f64 {
    match points.get(key) {
        None => 0.0,
        Some(value) => value.as_f64().unwrap_or(f64::NAN),
    }
}

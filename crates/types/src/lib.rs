#![allow(dead_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity and credentials for one configured meter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_id: String,
    pub address: String,
    pub local_key: String,
}

/// Raw point values as they appear in a device status payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    /// Numeric view of the raw value. Strings are parsed; anything that is
    /// not a number yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            RawValue::Int(value) => Some(*value as f64),
            RawValue::Float(value) => Some(*value),
            RawValue::Text(value) => value.trim().parse::<f64>().ok(),
        }
    }
}

/// Session protocol generations the meters may be provisioned with.
///
/// A device only answers correctly on the generation it was provisioned
/// with; a mismatch shows up as a transport or framing failure rather than a
/// negotiation response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V3_4,
    V3_3,
    V3_2,
    V3_1,
    V3_0,
}

impl ProtocolVersion {
    /// Fixed candidate order for fallback scans, newest first.
    pub const CANDIDATES: [ProtocolVersion; 5] = [
        ProtocolVersion::V3_4,
        ProtocolVersion::V3_3,
        ProtocolVersion::V3_2,
        ProtocolVersion::V3_1,
        ProtocolVersion::V3_0,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V3_4 => "3.4",
            ProtocolVersion::V3_3 => "3.3",
            ProtocolVersion::V3_2 => "3.2",
            ProtocolVersion::V3_1 => "3.1",
            ProtocolVersion::V3_0 => "3.0",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest decoded telemetry for one meter.
///
/// Every field is either a decoded number or NaN; NaN marks a value the
/// last poll cycle could not produce.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceReading {
    pub current_a: f64,
    pub current_b: f64,
    pub direction_current_a: f64,
    pub direction_current_b: f64,
    pub energy_forward_a: f64,
    pub energy_forward_b: f64,
    pub energy_reverse_a: f64,
    pub energy_reverse_b: f64,
    pub power_a: f64,
    pub power_b: f64,
    pub power_factor_a: f64,
    pub power_factor_b: f64,
    pub forward_energy_total: f64,
    pub reverse_energy_total: f64,
    pub total_power: f64,
    pub frequency: f64,
    pub voltage: f64,
}

impl DeviceReading {
    /// Reading with every field set to the missing sentinel. Written before
    /// the first successful poll and whenever a whole cycle fails.
    pub fn missing() -> Self {
        Self {
            current_a: f64::NAN,
            current_b: f64::NAN,
            direction_current_a: f64::NAN,
            direction_current_b: f64::NAN,
            energy_forward_a: f64::NAN,
            energy_forward_b: f64::NAN,
            energy_reverse_a: f64::NAN,
            energy_reverse_b: f64::NAN,
            power_a: f64::NAN,
            power_b: f64::NAN,
            power_factor_a: f64::NAN,
            power_factor_b: f64::NAN,
            forward_energy_total: f64::NAN,
            reverse_energy_total: f64::NAN,
            total_power: f64::NAN,
            frequency: f64::NAN,
            voltage: f64::NAN,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_nan())
    }

    /// Field name/value pairs in catalog order.
    pub fn fields(&self) -> [(&'static str, f64); 17] {
        [
            ("current_a", self.current_a),
            ("current_b", self.current_b),
            ("direction_current_a", self.direction_current_a),
            ("direction_current_b", self.direction_current_b),
            ("energy_forward_a", self.energy_forward_a),
            ("energy_forward_b", self.energy_forward_b),
            ("energy_reverse_a", self.energy_reverse_a),
            ("energy_reverse_b", self.energy_reverse_b),
            ("power_a", self.power_a),
            ("power_b", self.power_b),
            ("power_factor_a", self.power_factor_a),
            ("power_factor_b", self.power_factor_b),
            ("forward_energy_total", self.forward_energy_total),
            ("reverse_energy_total", self.reverse_energy_total),
            ("total_power", self.total_power),
            ("frequency", self.frequency),
            ("voltage", self.voltage),
        ]
    }
}

impl Default for DeviceReading {
    fn default() -> Self {
        Self::missing()
    }
}

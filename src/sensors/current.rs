//! Shunt resistor followed by a current-sense amplifier.

use crate::drivers::ads112c04::Gain;

pub const UNITS: &[&str] = &["A", "V"];
pub const GAIN: Gain = Gain::Bypass;

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSensor {
    shunt_ohms: f32,
    csa_gain: f32,
}

impl CurrentSensor {
    pub fn new(shunt_ohms: f32, csa_gain: f32) -> Self {
        Self { shunt_ohms, csa_gain }
    }

    pub fn convert(&self, volts: f32, unit: &str) -> Option<f32> {
        match unit {
            "A" => Some(volts / (self.shunt_ohms * self.csa_gain)),
            "V" => Some(volts),
            _ => None,
        }
    }
}

//! Pressure transducer with a 1-5 V output (250 Ω sense on a 4-20 mA loop).

use crate::drivers::ads112c04::Gain;

pub const UNITS: &[&str] = &["PSI", "V"];
pub const GAIN: Gain = Gain::Bypass;

/// Output at zero pressure and the span up to full scale.
const ZERO_V: f32 = 1.0;
const SPAN_V: f32 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PressureTransducer {
    max_psi: f32,
}

impl PressureTransducer {
    pub fn new(max_psi: f32) -> Self {
        Self { max_psi }
    }

    pub fn convert(&self, volts: f32, unit: &str) -> Option<f32> {
        match unit {
            "PSI" => Some((volts - ZERO_V) / SPAN_V * self.max_psi),
            "V" => Some(volts),
            _ => None,
        }
    }
}

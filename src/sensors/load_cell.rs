//! Strain-gauge load cell on a full bridge.
//!
//! The bridge output is linear in load up to the rated capacity, where it
//! reaches `excitation × sensitivity` (the full-scale voltage).  Read at PGA
//! gain 8 on the external ADC.

use crate::drivers::ads112c04::Gain;

pub const UNITS: &[&str] = &["kg", "N", "V"];
pub const GAIN: Gain = Gain::X8;

/// Newtons per kilogram-force used by the test stand's calibration sheets.
const NEWTONS_PER_KGF: f32 = 9.805;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadCell {
    rating_n: f32,
    full_scale_v: f32,
}

impl LoadCell {
    /// `sensitivity_mv_per_v` is the datasheet figure in mV/V.
    pub fn new(rating_n: f32, excitation_v: f32, sensitivity_mv_per_v: f32) -> Self {
        Self {
            rating_n,
            full_scale_v: excitation_v * (sensitivity_mv_per_v / 1000.0),
        }
    }

    pub fn full_scale_v(&self) -> f32 {
        self.full_scale_v
    }

    pub fn convert(&self, volts: f32, unit: &str) -> Option<f32> {
        let fraction = volts / self.full_scale_v;
        match unit {
            "kg" => Some(fraction * (self.rating_n / NEWTONS_PER_KGF)),
            "N" => Some(fraction * self.rating_n),
            "V" => Some(volts),
            _ => None,
        }
    }
}

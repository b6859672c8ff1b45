//! Thermocouple read differentially at PGA gain 1.

use crate::drivers::ads112c04::Gain;

pub const UNITS: &[&str] = &["V", "C"];
pub const GAIN: Gain = Gain::X1;

#[derive(Debug, Clone, PartialEq)]
pub struct Thermocouple {
    thermo_type: String,
}

impl Thermocouple {
    pub fn new(thermo_type: impl Into<String>) -> Self {
        Self {
            thermo_type: thermo_type.into(),
        }
    }

    pub fn thermo_type(&self) -> &str {
        &self.thermo_type
    }

    /// "C" currently returns the junction voltage unchanged.
    pub fn convert(&self, volts: f32, unit: &str) -> Option<f32> {
        match unit {
            "V" => Some(volts),
            // TODO: ITS-90 polynomial per `thermo_type` with cold-junction
            // compensation once the amplifier front end is finalised.
            "C" => Some(volts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_is_voltage_pass_through() {
        let tc = Thermocouple::new("K");
        assert_eq!(tc.convert(0.0012, "C"), Some(0.0012));
        assert_eq!(tc.convert(0.0012, "F"), None);
        assert_eq!(tc.thermo_type(), "K");
    }
}

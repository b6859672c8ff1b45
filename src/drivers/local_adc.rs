//! On-chip ADC port.
//!
//! Sensors wired straight to the ESP32-S3 read raw 12-bit counts through
//! this trait; the ESP-IDF oneshot implementation lives in `adapters::esp`
//! and a table-driven stand-in in `adapters::sim`.

use crate::error::SensorError;
use crate::pins::{LOCAL_ADC_FULL_SCALE_V, LOCAL_ADC_MAX_COUNTS};

pub trait LocalAdc {
    /// Raw counts (0..=4095) on `gpio`.
    fn read_raw(&mut self, gpio: i32) -> Result<u16, SensorError>;
}

/// Scale a (possibly negative, for differential pairs) count to volts.
pub fn counts_to_volts(counts: i32) -> f32 {
    counts as f32 / f32::from(LOCAL_ADC_MAX_COUNTS) * LOCAL_ADC_FULL_SCALE_V
}

/// Single-ended read when `low` is `None`, otherwise `high - low`.
pub fn read_volts(adc: &mut dyn LocalAdc, high: i32, low: Option<i32>) -> Result<f32, SensorError> {
    let high_counts = i32::from(adc.read_raw(high)?);
    let low_counts = match low {
        Some(pin) => i32::from(adc.read_raw(pin)?),
        None => 0,
    };
    Ok(counts_to_volts(high_counts - low_counts))
}

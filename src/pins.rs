//! GPIO / peripheral assignments for the sensor node board (ESP32-S3).
//!
//! Single source of truth for bus pins, converter limits and network
//! constants.  Sensor and control pins come from `ESPConfig.json` instead.

// ---------------------------------------------------------------------------
// I²C bus (external ADS112C04 converters)
// ---------------------------------------------------------------------------

pub const I2C_SCL_GPIO: i32 = 16;
pub const I2C_SDA_GPIO: i32 = 15;
/// Standard-mode clock.
pub const I2C_FREQ_HZ: u32 = 100_000;

/// ADS112C04 strap-selectable address window (A0/A1 pins).
pub const ADS_ADDR_FIRST: u8 = 0x40;
pub const ADS_ADDR_LAST: u8 = 0x4F;
/// `ADCIndex` values 1..=MAX_EXTERNAL_ADCS address converters in scan order.
pub const MAX_EXTERNAL_ADCS: usize = 4;
/// AVDD, selected as the converter reference (CONFIG1 VREF = 10).
pub const ADS_VREF_V: f32 = 5.0;

// ---------------------------------------------------------------------------
// On-chip ADC (ADC1, 12-bit, 11 dB attenuation)
// ---------------------------------------------------------------------------

/// Full-scale count of the on-chip converter.
pub const LOCAL_ADC_MAX_COUNTS: u16 = 4095;
/// Voltage at full-scale count.
pub const LOCAL_ADC_FULL_SCALE_V: f32 = 3.3;

// ---------------------------------------------------------------------------
// Status indicator
// ---------------------------------------------------------------------------

/// Lit once Wi-Fi association succeeds.
pub const WIFI_INDICATOR_GPIO: i32 = 8;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// TCP command/streaming port.
pub const TCP_PORT: u16 = 50_000;
/// SSDP multicast group and port.
pub const SSDP_GROUP: [u8; 4] = [239, 255, 255, 250];
pub const SSDP_PORT: u16 = 1900;
/// Largest single frame the link accepts (CONF frame bound).
pub const LINK_BLOCK_SIZE: usize = 2048;

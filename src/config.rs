//! Node configuration (`ESPConfig.json`).
//!
//! The same document is parsed at boot to build sensors and controls and is
//! echoed verbatim to every client as the `CONF` frame, so field names follow
//! the JSON keys the ground station expects rather than Rust conventions.
//!
//! ```text
//! {
//!   "deviceName": "...", "deviceType": "Sensor Monitor",
//!   "sensorInfo": { "thermocouples": {..}, "pressureTransducers": {..},
//!                   "loadCells": {..}, "currentSensors": {..} },
//!   "controls": { "<name>": { "pin": 4, "type": "valve", "defaultState": "CLOSED" } }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CommsError, Error, Result};
use crate::pins::{LINK_BLOCK_SIZE, MAX_EXTERNAL_ADCS};
use crate::sensors::{current, load_cell, pressure, thermocouple};

/// The only device type this firmware knows how to build.
pub const SENSOR_MONITOR: &str = "Sensor Monitor";

/// Pin value meaning "ground referenced" for the negative input.
pub const GROUND_PIN: i32 = -1;

fn ground_pin() -> i32 {
    GROUND_PIN
}

fn default_current_unit() -> String {
    "A".into()
}

/// Top-level device description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub device_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub sensor_info: SensorInfo,
    #[serde(default)]
    pub controls: BTreeMap<String, ControlConfig>,
    /// Station credentials.  Read at boot, never sent to clients.
    #[serde(default, skip_serializing)]
    pub network: Option<NetworkConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorInfo {
    #[serde(default)]
    pub thermocouples: BTreeMap<String, ThermocoupleConfig>,
    #[serde(default)]
    pub pressure_transducers: BTreeMap<String, PressureConfig>,
    #[serde(default)]
    pub load_cells: BTreeMap<String, LoadCellConfig>,
    #[serde(default)]
    pub current_sensors: BTreeMap<String, CurrentConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermocoupleConfig {
    #[serde(rename = "ADCIndex")]
    pub adc_index: i32,
    #[serde(rename = "highPin")]
    pub high_pin: i32,
    #[serde(rename = "lowPin", default = "ground_pin")]
    pub low_pin: i32,
    pub units: String,
    /// Thermocouple letter type (K, T, ...).
    #[serde(rename = "type")]
    pub thermo_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureConfig {
    #[serde(rename = "ADCIndex")]
    pub adc_index: i32,
    pub pin: i32,
    #[serde(rename = "maxPressure_PSI")]
    pub max_pressure_psi: f32,
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadCellConfig {
    #[serde(rename = "ADCIndex")]
    pub adc_index: i32,
    #[serde(rename = "highPin")]
    pub high_pin: i32,
    #[serde(rename = "lowPin", default = "ground_pin")]
    pub low_pin: i32,
    #[serde(rename = "loadRating_N")]
    pub load_rating_n: f32,
    #[serde(rename = "excitation_V")]
    pub excitation_v: f32,
    /// Bridge sensitivity in mV/V.
    #[serde(rename = "sensitivity_vV")]
    pub sensitivity_mv_per_v: f32,
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConfig {
    #[serde(rename = "ADCIndex")]
    pub adc_index: i32,
    pub pin: i32,
    #[serde(rename = "shuntResistor_Ohms")]
    pub shunt_ohms: f32,
    #[serde(rename = "csaGain")]
    pub csa_gain: f32,
    #[serde(default = "default_current_unit")]
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    pub pin: i32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "defaultState")]
    pub default_state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub ssid: String,
    pub password: String,
}

impl NodeConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| {
            log::error!("config: JSON parse failed: {e}");
            Error::Config("malformed config JSON")
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            log::error!("config: cannot read {}: {e}", path.display());
            Error::Config("config file unreadable")
        })?;
        Self::from_json_str(&json)
    }

    /// Structural checks that would otherwise surface as confusing runtime
    /// failures once a client is connected.
    pub fn validate(&self) -> Result<()> {
        match self.device_type.as_deref() {
            Some(SENSOR_MONITOR) => {}
            None => return Err(Error::Config("device type not specified")),
            Some(_) => return Err(Error::Config("unknown device type")),
        }

        let info = &self.sensor_info;
        let mut names = BTreeSet::new();
        let mut claim = |name: &str| -> Result<()> {
            if names.insert(name.to_ascii_uppercase()) {
                Ok(())
            } else {
                Err(Error::Config("duplicate sensor name"))
            }
        };

        for (name, tc) in &info.thermocouples {
            claim(name)?;
            check_adc_index(tc.adc_index)?;
            check_unit(&tc.units, thermocouple::UNITS)?;
        }
        for (name, pt) in &info.pressure_transducers {
            claim(name)?;
            check_adc_index(pt.adc_index)?;
            check_unit(&pt.units, pressure::UNITS)?;
        }
        for (name, lc) in &info.load_cells {
            claim(name)?;
            check_adc_index(lc.adc_index)?;
            check_unit(&lc.units, load_cell::UNITS)?;
            if lc.excitation_v <= 0.0 || lc.sensitivity_mv_per_v <= 0.0 {
                return Err(Error::Config("load cell full-scale voltage must be positive"));
            }
        }
        for (name, cs) in &info.current_sensors {
            claim(name)?;
            check_adc_index(cs.adc_index)?;
            check_unit(&cs.units, current::UNITS)?;
            if cs.shunt_ohms <= 0.0 || cs.csa_gain <= 0.0 {
                return Err(Error::Config("current sensor shunt and gain must be positive"));
            }
        }

        let mut controls = BTreeSet::new();
        for (name, ctl) in &self.controls {
            if !controls.insert(name.to_ascii_uppercase()) {
                return Err(Error::Config("duplicate control name"));
            }
            let state = ctl.default_state.to_ascii_uppercase();
            if state != "OPEN" && state != "CLOSED" {
                return Err(Error::Config("defaultState must be OPEN or CLOSED"));
            }
        }
        Ok(())
    }

    /// Render the `CONF<json>\n` frame sent on every new connection.
    pub fn conf_frame(&self) -> Result<String> {
        let json = serde_json::to_string(self).map_err(|_| Error::Config("config not serialisable"))?;
        let frame = format!("CONF{json}\n");
        if frame.len() > LINK_BLOCK_SIZE {
            return Err(CommsError::FrameTooLarge {
                len: frame.len(),
                max: LINK_BLOCK_SIZE,
            }
            .into());
        }
        Ok(frame)
    }
}

fn check_adc_index(index: i32) -> Result<()> {
    if (0..=MAX_EXTERNAL_ADCS as i32).contains(&index) {
        Ok(())
    } else {
        Err(Error::Config("ADCIndex must be between 0 and 4"))
    }
}

fn check_unit(unit: &str, valid: &[&str]) -> Result<()> {
    if valid.contains(&unit) {
        Ok(())
    } else {
        Err(Error::Config("sensor unit not valid for its kind"))
    }
}

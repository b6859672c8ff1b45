//! Node service — sensors, controls and converters behind one handle.
//!
//! [`NodeService`] is built once from [`NodeConfig`] at boot and shared
//! (`Rc<RefCell<_>>`) between the connection FSM and the stream task.  Every
//! method is synchronous: a borrow never spans an `.await`.
//!
//! ```text
//!   NodeConfig ──▶ ┌────────────────────────┐
//!   AdcSet     ──▶ │      NodeService       │ ──▶ GETS / STRM payload
//!   LocalAdc   ──▶ │ sensors · controls     │ ──▶ STATUS json
//!   make_pin   ──▶ └────────────────────────┘ ◀── CONTROL
//! ```

use core::fmt::Write as _;

use embedded_hal::digital::StatefulOutputPin;
use log::{info, warn};

use crate::adapters::time::Uptime;
use crate::config::NodeConfig;
use crate::control::{Actuation, ControlBank};
use crate::drivers::ads112c04::AdcSet;
use crate::error::{ControlError, Result};
use crate::sensors::{self, Sensor, SharedLocalAdc};

pub struct NodeService<P> {
    device_name: String,
    sensors: Vec<Sensor>,
    controls: ControlBank<P>,
    /// Owns the converters; sensors only hold weak handles.
    adcs: AdcSet,
    clock: Uptime,
}

impl<P: StatefulOutputPin> NodeService<P> {
    /// Build sensors and controls from the config.  Fails only on
    /// configuration faults; missing converters degrade to per-sensor errors.
    pub fn from_config(
        cfg: &NodeConfig,
        adcs: AdcSet,
        local: &SharedLocalAdc,
        make_pin: impl FnMut(i32) -> core::result::Result<P, ControlError>,
    ) -> Result<Self> {
        cfg.validate()?;
        info!("Initializing device: {}", cfg.device_name);
        let sensors = sensors::build_all(&cfg.sensor_info, &adcs, local)?;
        let controls = ControlBank::from_config(&cfg.controls, make_pin)?;
        Ok(Self {
            device_name: cfg.device_name.clone(),
            sensors,
            controls,
            adcs,
            clock: Uptime::new(),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn sensor_mut(&mut self, name: &str) -> Option<&mut Sensor> {
        self.sensors
            .iter_mut()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    pub fn controls(&self) -> &ControlBank<P> {
        &self.controls
    }

    pub fn adc_count(&self) -> usize {
        self.adcs.len()
    }

    pub fn uptime_ms(&self) -> u64 {
        self.clock.millis()
    }

    /// One reading per sensor in its default unit:
    /// `<uptime_ms> name:value name:value ...`.  A sensor that fails renders
    /// as `name:ERR` so one bad channel never hides the others.
    pub fn gets_payload(&mut self) -> String {
        let mut out = self.clock.millis().to_string();
        for sensor in &mut self.sensors {
            match sensor.take_data("default") {
                Ok(value) => {
                    let _ = write!(out, " {}:{value}", sensor.name());
                }
                Err(e) => {
                    warn!("sensor {}: {e}", sensor.name());
                    let _ = write!(out, " {}:ERR", sensor.name());
                }
            }
        }
        out
    }

    /// Control states as a JSON object, e.g. `{"VALVE1":"OPEN"}`.
    pub fn status_json(&self) -> String {
        serde_json::to_string(&self.controls.status()).unwrap_or_else(|e| {
            warn!("STATUS serialisation failed: {e}");
            "{}".into()
        })
    }

    pub fn actuate(
        &mut self,
        name: &str,
        action: &str,
    ) -> core::result::Result<Actuation, ControlError> {
        self.controls.actuate(name, action)
    }
}

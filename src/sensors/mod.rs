//! Sensor subsystem — one tagged [`SensorKind`] per transducer type behind
//! a common [`Sensor::take_data`].
//!
//! ```text
//!   Sensor ──► SensorSource::Local    ──► LocalAdc (counts → V)
//!          └─► SensorSource::External ──► Weak<ExternalAdc> (ADS112C04)
//!                         │
//!                         ▼ volts
//!                 SensorKind::convert(unit)
//! ```
//!
//! Sensors never own an external converter: the [`AdcSet`] built at boot
//! does, and a sensor whose converter is gone reports it as unavailable.

pub mod current;
pub mod load_cell;
pub mod pressure;
pub mod thermocouple;

use core::cell::RefCell;
use std::rc::{Rc, Weak};

use heapless::HistoryBuffer;

use crate::config::{GROUND_PIN, SensorInfo};
use crate::drivers::ads112c04::{AdcSet, ExternalAdc, Gain, Input, mux_code};
use crate::drivers::local_adc::{self, LocalAdc};
use crate::error::{AdcError, Result, SensorError};
use current::CurrentSensor;
use load_cell::LoadCell;
use pressure::PressureTransducer;
use thermocouple::Thermocouple;

/// Readings retained per sensor.
pub const HISTORY_LEN: usize = 128;

/// Unit aliases that select the sensor's configured unit.
const DEFAULT_UNITS: [&str; 2] = ["default", "DEF"];

pub type SharedLocalAdc = Rc<RefCell<dyn LocalAdc>>;

// ── Kinds ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SensorKind {
    LoadCell(LoadCell),
    Pressure(PressureTransducer),
    Thermocouple(Thermocouple),
    Current(CurrentSensor),
}

impl SensorKind {
    pub fn valid_units(&self) -> &'static [&'static str] {
        match self {
            Self::LoadCell(_) => load_cell::UNITS,
            Self::Pressure(_) => pressure::UNITS,
            Self::Thermocouple(_) => thermocouple::UNITS,
            Self::Current(_) => current::UNITS,
        }
    }

    /// PGA setting the external ADC must hold while this sensor is read.
    pub fn required_gain(&self) -> Gain {
        match self {
            Self::LoadCell(_) => load_cell::GAIN,
            Self::Pressure(_) => pressure::GAIN,
            Self::Thermocouple(_) => thermocouple::GAIN,
            Self::Current(_) => current::GAIN,
        }
    }

    fn convert(&self, volts: f32, unit: &str) -> Option<f32> {
        match self {
            Self::LoadCell(k) => k.convert(volts, unit),
            Self::Pressure(k) => k.convert(volts, unit),
            Self::Thermocouple(k) => k.convert(volts, unit),
            Self::Current(k) => k.convert(volts, unit),
        }
    }
}

// ── Sources ───────────────────────────────────────────────────

pub enum SensorSource {
    /// On-chip ADC; `low = None` is ground referenced.
    Local {
        adc: SharedLocalAdc,
        high: i32,
        low: Option<i32>,
    },
    /// External converter; `adc = None` when its slot failed at boot.
    External {
        adc: Option<Weak<RefCell<dyn ExternalAdc>>>,
        positive: Input,
        negative: Input,
    },
}

impl SensorSource {
    /// Resolve a config `ADCIndex` / pin pair.
    pub fn from_config(
        adc_index: i32,
        high: i32,
        low: i32,
        adcs: &AdcSet,
        local: &SharedLocalAdc,
    ) -> Result<Self> {
        if adc_index == 0 {
            return Ok(Self::Local {
                adc: Rc::clone(local),
                high,
                low: (low != GROUND_PIN).then_some(low),
            });
        }
        let positive = Input::from_pin(high)?;
        let negative = Input::from_pin(low)?;
        if mux_code(positive, negative).is_none() {
            return Err(AdcError::InvalidChannel.into());
        }
        Ok(Self::External {
            adc: adcs.handle(adc_index)?,
            positive,
            negative,
        })
    }
}

// ── Sensor ────────────────────────────────────────────────────

pub struct Sensor {
    name: String,
    source: SensorSource,
    kind: SensorKind,
    unit: String,
    history: HistoryBuffer<f32, HISTORY_LEN>,
}

impl Sensor {
    pub fn new(
        name: impl Into<String>,
        source: SensorSource,
        kind: SensorKind,
        unit: impl Into<String>,
    ) -> core::result::Result<Self, SensorError> {
        let unit = unit.into();
        if !kind.valid_units().contains(&unit.as_str()) {
            return Err(SensorError::InvalidUnit {
                valid: kind.valid_units(),
            });
        }
        Ok(Self {
            name: name.into(),
            source,
            kind,
            unit,
            history: HistoryBuffer::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn kind(&self) -> &SensorKind {
        &self.kind
    }

    /// Most recent successful reading.
    pub fn last(&self) -> Option<f32> {
        self.history.recent().copied()
    }

    /// Retained readings, oldest first.
    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.oldest_ordered().copied()
    }

    /// Take one reading in `unit` ("default"/"DEF" for the configured unit)
    /// and append it to the history.
    pub fn take_data(&mut self, unit: &str) -> Result<f32> {
        let unit = if DEFAULT_UNITS.contains(&unit) {
            self.unit.clone()
        } else {
            unit.to_owned()
        };
        if !self.kind.valid_units().contains(&unit.as_str()) {
            return Err(SensorError::InvalidUnit {
                valid: self.kind.valid_units(),
            }
            .into());
        }

        let volts = self.voltage()?;
        let value = self
            .kind
            .convert(volts, &unit)
            .ok_or(SensorError::InvalidUnit {
                valid: self.kind.valid_units(),
            })?;
        self.history.write(value);
        Ok(value)
    }

    /// Raw input voltage from whichever converter the sensor is wired to.
    pub fn voltage(&mut self) -> Result<f32> {
        match &self.source {
            SensorSource::Local { adc, high, low } => {
                Ok(local_adc::read_volts(&mut *adc.borrow_mut(), *high, *low)?)
            }
            SensorSource::External {
                adc,
                positive,
                negative,
            } => {
                let adc = adc
                    .as_ref()
                    .and_then(Weak::upgrade)
                    .ok_or(SensorError::AdcUnavailable)?;
                let mut adc = adc.borrow_mut();
                let gain = self.kind.required_gain();
                if adc.gain() != gain {
                    adc.set_gain(gain)?;
                }
                Ok(adc.read(*positive, *negative, gain)?)
            }
        }
    }
}

/// Build every sensor in the `sensorInfo` block.  Order: thermocouples,
/// pressure transducers, load cells, current sensors; by name within each.
pub fn build_all(info: &SensorInfo, adcs: &AdcSet, local: &SharedLocalAdc) -> Result<Vec<Sensor>> {
    let mut sensors = Vec::new();

    for (name, tc) in &info.thermocouples {
        let source = SensorSource::from_config(tc.adc_index, tc.high_pin, tc.low_pin, adcs, local)?;
        let kind = SensorKind::Thermocouple(Thermocouple::new(tc.thermo_type.as_str()));
        sensors.push(Sensor::new(name.as_str(), source, kind, tc.units.as_str())?);
    }
    for (name, pt) in &info.pressure_transducers {
        let source = SensorSource::from_config(pt.adc_index, pt.pin, GROUND_PIN, adcs, local)?;
        let kind = SensorKind::Pressure(PressureTransducer::new(pt.max_pressure_psi));
        sensors.push(Sensor::new(name.as_str(), source, kind, pt.units.as_str())?);
    }
    for (name, lc) in &info.load_cells {
        let source = SensorSource::from_config(lc.adc_index, lc.high_pin, lc.low_pin, adcs, local)?;
        let kind = SensorKind::LoadCell(LoadCell::new(
            lc.load_rating_n,
            lc.excitation_v,
            lc.sensitivity_mv_per_v,
        ));
        sensors.push(Sensor::new(name.as_str(), source, kind, lc.units.as_str())?);
    }
    for (name, cs) in &info.current_sensors {
        let source = SensorSource::from_config(cs.adc_index, cs.pin, GROUND_PIN, adcs, local)?;
        let kind = SensorKind::Current(CurrentSensor::new(cs.shunt_ohms, cs.csa_gain));
        sensors.push(Sensor::new(name.as_str(), source, kind, cs.units.as_str())?);
    }

    log::info!("sensors: {} configured", sensors.len());
    Ok(sensors)
}

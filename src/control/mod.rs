//! Binary actuators (valves, relays) with default-relative polarity.
//!
//! The pin is driven HIGH only while a control is away from its default
//! state:
//!
//! | default | state  | pin  |
//! |---------|--------|------|
//! | CLOSED  | CLOSED | LOW  |
//! | CLOSED  | OPEN   | HIGH |
//! | OPEN    | OPEN   | LOW  |
//! | OPEN    | CLOSED | HIGH |
//!
//! Actuation is open loop; the pin level is the only feedback.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use embedded_hal::digital::StatefulOutputPin;
use serde::Serialize;

use crate::config::ControlConfig;
use crate::error::{ControlError, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValveState {
    Open,
    Closed,
}

impl ValveState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ValveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValveState {
    type Err = Error;

    /// Case-insensitive, as written in `defaultState`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "CLOSED" => Ok(Self::Closed),
            _ => Err(Error::Config("defaultState must be OPEN or CLOSED")),
        }
    }
}

/// Requested change, as sent in `CONTROL <name> <OPEN|CLOSE>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Open,
    Close,
}

impl Action {
    /// Exact, upper-case match only.
    pub fn parse(s: &str) -> core::result::Result<Self, ControlError> {
        match s {
            "OPEN" => Ok(Self::Open),
            "CLOSE" => Ok(Self::Close),
            _ => Err(ControlError::InvalidAction),
        }
    }

    const fn target(self) -> ValveState {
        match self {
            Self::Open => ValveState::Open,
            Self::Close => ValveState::Closed,
        }
    }
}

/// Outcome of [`ControlBank::actuate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuation {
    /// The pin was driven and the control is now in this state.
    Changed(ValveState),
    /// The control was already in this state; the pin was left alone.
    Unchanged(ValveState),
}

// ── Control ───────────────────────────────────────────────────

pub struct Control<P> {
    name: String,
    kind: String,
    pin: P,
    default: ValveState,
    state: ValveState,
}

impl<P: StatefulOutputPin> Control<P> {
    /// Takes the pin and drives it to the inactive (default) level.
    pub fn new(
        name: &str,
        kind: &str,
        mut pin: P,
        default: ValveState,
    ) -> core::result::Result<Self, ControlError> {
        pin.set_low().map_err(|_| ControlError::PinWriteFailed)?;
        Ok(Self {
            name: name.to_ascii_uppercase(),
            kind: kind.to_ascii_uppercase(),
            pin,
            default,
            state: default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn default_state(&self) -> ValveState {
        self.default
    }

    pub fn open(&mut self) -> core::result::Result<(), ControlError> {
        self.drive(ValveState::Open)
    }

    pub fn close(&mut self) -> core::result::Result<(), ControlError> {
        self.drive(ValveState::Closed)
    }

    /// Current output level, `true` = HIGH (active).
    pub fn pin_is_high(&mut self) -> core::result::Result<bool, ControlError> {
        self.pin
            .is_set_high()
            .map_err(|_| ControlError::PinWriteFailed)
    }

    fn drive(&mut self, target: ValveState) -> core::result::Result<(), ControlError> {
        let result = if target == self.default {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        result.map_err(|_| ControlError::PinWriteFailed)?;
        self.state = target;
        log::info!("control {}: {}", self.name, target);
        Ok(())
    }
}

// ── Bank ──────────────────────────────────────────────────────

/// All controls, keyed by upper-cased name.
pub struct ControlBank<P> {
    controls: BTreeMap<String, Control<P>>,
}

impl<P> Default for ControlBank<P> {
    fn default() -> Self {
        Self {
            controls: BTreeMap::new(),
        }
    }
}

impl<P: StatefulOutputPin> ControlBank<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured control, asking `make_pin` for the output on
    /// each GPIO.
    pub fn from_config(
        controls: &BTreeMap<String, ControlConfig>,
        mut make_pin: impl FnMut(i32) -> core::result::Result<P, ControlError>,
    ) -> Result<Self> {
        let mut bank = Self::new();
        for (name, cfg) in controls {
            let default: ValveState = cfg.default_state.parse()?;
            let pin = make_pin(cfg.pin)?;
            bank.insert(Control::new(name, &cfg.kind, pin, default)?);
        }
        log::info!("controls: {} configured", bank.len());
        Ok(bank)
    }

    pub fn insert(&mut self, control: Control<P>) {
        self.controls.insert(control.name.clone(), control);
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Control<P>> {
        self.controls.get_mut(&name.to_ascii_uppercase())
    }

    /// Apply `action` to `name`.  A control already in the requested state
    /// is reported as [`Actuation::Unchanged`] without touching the pin.
    pub fn actuate(
        &mut self,
        name: &str,
        action: &str,
    ) -> core::result::Result<Actuation, ControlError> {
        let control = self.get_mut(name).ok_or(ControlError::UnknownControl)?;
        let target = Action::parse(action)?.target();
        if control.state() == target {
            return Ok(Actuation::Unchanged(target));
        }
        control.drive(target)?;
        Ok(Actuation::Changed(target))
    }

    /// Name → logical state snapshot.
    pub fn status(&self) -> BTreeMap<&str, ValveState> {
        self.controls
            .iter()
            .map(|(name, control)| (name.as_str(), control.state()))
            .collect()
    }
}

//! ADS112C04 16-bit I²C ADC driver.
//!
//! Texas Instruments ADS112C04: 4 inputs, one multiplexer, a PGA (1-128×,
//! bypassable) and a command-based register interface.
//!
//! ```text
//!  CONFIG0   7      4 3     1    0
//!           ┌────────┬───────┬──────┐
//!           │ MUX    │ GAIN  │BYPASS│
//!           └────────┴───────┴──────┘
//!  CONFIG1   DR=110 MODE=0 CM=1 VREF=xx TS=0   → 0xC8 | VREF (1000 SPS, continuous)
//! ```
//!
//! The VREF field and the code → volts scale both come from one
//! [`Reference`], so they cannot disagree.
//!
//! The driver caches the active input pair and gain and reprograms the
//! device lazily, only when a read asks for a different configuration.
//! Register writes are verified by read-back; a mismatch is logged and the
//! cache left stale so the next read retries.

use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use embedded_hal::i2c::I2c;
use log::{debug, error, info, warn};

use crate::error::{AdcError, Error, SensorError};

/// Register addresses.
#[allow(dead_code)]
mod regs {
    pub const CONFIG0: u8 = 0x00;
    pub const CONFIG1: u8 = 0x01;
    pub const CONFIG2: u8 = 0x02;
    pub const CONFIG3: u8 = 0x03;
}

/// Command bytes.
mod cmd {
    pub const RESET: u8 = 0x06;
    pub const START: u8 = 0x08;
    pub const POWERDOWN: u8 = 0x02;
    pub const RDATA: u8 = 0x10;
    pub const RREG: u8 = 0x20;
    pub const WREG: u8 = 0x40;
}

const MUX_MASK: u8 = 0xF0;
const PGA_BYPASS: u8 = 0x01;
/// 1000 SPS, normal mode, continuous conversion; VREF bits clear.
const CONFIG1_CONTINUOUS: u8 = 0xC8;
const INTERNAL_REF_V: f32 = 2.048;
/// Full-scale code magnitude (2^15).
const FULL_SCALE_CODES: f32 = 32_768.0;

// ---------------------------------------------------------------------------
// Inputs and multiplexer table
// ---------------------------------------------------------------------------

/// One side of a multiplexer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Ain0,
    Ain1,
    Ain2,
    Ain3,
    Gnd,
}

impl Input {
    /// Map a configured pin number; -1 means ground.
    pub fn from_pin(pin: i32) -> Result<Self, SensorError> {
        match pin {
            0 => Ok(Self::Ain0),
            1 => Ok(Self::Ain1),
            2 => Ok(Self::Ain2),
            3 => Ok(Self::Ain3),
            -1 => Ok(Self::Gnd),
            other => Err(SensorError::InvalidPin(other)),
        }
    }
}

/// MUX[3:0] code for a (positive, negative) pair, `None` if the device
/// cannot route it.
pub const fn mux_code(positive: Input, negative: Input) -> Option<u8> {
    use Input::{Ain0, Ain1, Ain2, Ain3, Gnd};
    match (positive, negative) {
        (Ain0, Gnd) => Some(0b1000),
        (Ain1, Gnd) => Some(0b1001),
        (Ain2, Gnd) => Some(0b1010),
        (Ain3, Gnd) => Some(0b1011),
        (Ain0, Ain1) => Some(0b0000),
        (Ain0, Ain2) => Some(0b0001),
        (Ain0, Ain3) => Some(0b0010),
        (Ain1, Ain2) => Some(0b0100),
        (Ain1, Ain3) => Some(0b0101),
        (Ain2, Ain3) => Some(0b0110),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Gain
// ---------------------------------------------------------------------------

/// Programmable gain setting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Gain {
    /// PGA bypassed (unity gain, wider common-mode range).
    Bypass,
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
    X128,
}

impl Gain {
    /// GAIN[2:0] field value.
    const fn code(self) -> u8 {
        match self {
            Self::Bypass | Self::X1 => 0b000,
            Self::X2 => 0b001,
            Self::X4 => 0b010,
            Self::X8 => 0b011,
            Self::X16 => 0b100,
            Self::X32 => 0b101,
            Self::X64 => 0b110,
            Self::X128 => 0b111,
        }
    }

    /// CONFIG0 bits [3:0] for this setting.
    pub const fn register_bits(self) -> u8 {
        match self {
            Self::Bypass => PGA_BYPASS,
            g => g.code() << 1,
        }
    }

    /// Divisor used in the code → volts conversion; bypass counts as 1.
    pub const fn magnitude(self) -> u8 {
        match self {
            Self::Bypass | Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
            Self::X32 => 32,
            Self::X64 => 64,
            Self::X128 => 128,
        }
    }
}

impl TryFrom<i32> for Gain {
    type Error = AdcError;

    /// -1 selects bypass.
    fn try_from(value: i32) -> Result<Self, AdcError> {
        match value {
            -1 => Ok(Self::Bypass),
            1 => Ok(Self::X1),
            2 => Ok(Self::X2),
            4 => Ok(Self::X4),
            8 => Ok(Self::X8),
            16 => Ok(Self::X16),
            32 => Ok(Self::X32),
            64 => Ok(Self::X64),
            128 => Ok(Self::X128),
            other => Err(AdcError::InvalidGain(other)),
        }
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bypass => f.write_str("bypass"),
            g => write!(f, "{}x", g.magnitude()),
        }
    }
}

/// Conversion reference, CONFIG1 VREF[2:1].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Reference {
    /// Internal 2.048 V reference (VREF = 00).
    Internal,
    /// REFP/REFN pins at the given voltage (VREF = 01).
    External(f32),
    /// Analog supply AVDD - AVSS at the given voltage (VREF = 10).
    Supply(f32),
}

impl Reference {
    pub const fn volts(self) -> f32 {
        match self {
            Self::Internal => INTERNAL_REF_V,
            Self::External(v) | Self::Supply(v) => v,
        }
    }

    /// CONFIG1 bits [2:1].
    pub const fn config1_bits(self) -> u8 {
        match self {
            Self::Internal => 0b00 << 1,
            Self::External(_) => 0b01 << 1,
            Self::Supply(_) => 0b10 << 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConversionMode {
    SingleShot,
    Continuous,
}

// ---------------------------------------------------------------------------
// ExternalAdc port
// ---------------------------------------------------------------------------

/// What a sensor needs from an external converter.
pub trait ExternalAdc {
    fn address(&self) -> u8;
    /// Gain the device is currently programmed with.
    fn gain(&self) -> Gain;
    fn set_gain(&mut self, gain: Gain) -> Result<(), AdcError>;
    /// Convert `positive - negative` at `gain` and return volts.
    fn read(&mut self, positive: Input, negative: Input, gain: Gain) -> Result<f32, AdcError>;
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

fn bus_error<E: embedded_hal::i2c::Error>(e: E) -> AdcError {
    AdcError::Bus(e.kind())
}

pub struct Ads112c04<I2C> {
    i2c: I2C,
    address: u8,
    reference: Reference,
    /// Last CONFIG0 value confirmed by read-back.
    config0: u8,
    active: Option<(Input, Input)>,
    gain: Gain,
    mode: ConversionMode,
}

impl<I2C: I2c> Ads112c04<I2C> {
    /// Create the driver and reset the device.  Fails if the device does
    /// not come out of reset with zeroed registers.
    pub fn new(i2c: I2C, address: u8, reference: Reference) -> Result<Self, AdcError> {
        let mut adc = Self {
            i2c,
            address,
            reference,
            config0: 0,
            active: None,
            gain: Gain::Bypass,
            mode: ConversionMode::SingleShot,
        };
        adc.reset()?;
        Ok(adc)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn active_channel(&self) -> Option<(Input, Input)> {
        self.active
    }

    pub fn mode(&self) -> ConversionMode {
        self.mode
    }

    /// RESET, verify CONFIG0 reads back zero, then bypass the PGA.
    pub fn reset(&mut self) -> Result<(), AdcError> {
        self.command(cmd::RESET)?;
        let readback = self.read_register(regs::CONFIG0)?;
        if readback != 0 {
            error!(
                "ADS112C04 0x{:02X}: reset verification failed (CONFIG0 = 0x{readback:02X})",
                self.address
            );
            return Err(AdcError::ResetFailed { readback });
        }

        self.config0 = 0;
        self.gain = Gain::X1;
        self.active = None;
        self.mode = ConversionMode::SingleShot;
        if self.write_verified(regs::CONFIG0, PGA_BYPASS)? {
            self.config0 = PGA_BYPASS;
            self.gain = Gain::Bypass;
        }
        info!("ADS112C04 0x{:02X}: reset OK", self.address);
        Ok(())
    }

    /// START/SYNC: begin conversions (continuous mode) or one conversion.
    pub fn start(&mut self) -> Result<(), AdcError> {
        self.command(cmd::START)
    }

    /// Enter power-down.  The next read re-arms continuous mode.
    pub fn power_down(&mut self) -> Result<(), AdcError> {
        self.command(cmd::POWERDOWN)?;
        self.mode = ConversionMode::SingleShot;
        Ok(())
    }

    /// Route `positive - negative` to the converter.
    ///
    /// The PGA is bypassed before the multiplexer moves: gains above 8 ignore
    /// the bypass bit and would otherwise see the switching transient.  The
    /// new CONFIG0 therefore always leaves the PGA bypassed.
    pub fn set_channel(&mut self, positive: Input, negative: Input) -> Result<(), AdcError> {
        let mux = mux_code(positive, negative).ok_or(AdcError::InvalidChannel)?;

        if self.gain != Gain::Bypass {
            let bypassed = (self.config0 & MUX_MASK) | PGA_BYPASS;
            if !self.write_verified(regs::CONFIG0, bypassed)? {
                return Ok(());
            }
            self.config0 = bypassed;
            self.gain = Gain::Bypass;
        }

        let value = (mux << 4) | PGA_BYPASS;
        if self.write_verified(regs::CONFIG0, value)? {
            self.config0 = value;
            self.active = Some((positive, negative));
            debug!(
                "ADS112C04 0x{:02X}: channel {positive:?}-{negative:?} (CONFIG0 0x{value:02X})",
                self.address
            );
        }
        Ok(())
    }

    /// Program the PGA, keeping the multiplexer bits.
    pub fn set_gain(&mut self, gain: Gain) -> Result<(), AdcError> {
        let value = (self.config0 & MUX_MASK) | gain.register_bits();
        if self.write_verified(regs::CONFIG0, value)? {
            self.config0 = value;
            self.gain = gain;
            debug!("ADS112C04 0x{:02X}: gain {gain}", self.address);
        }
        Ok(())
    }

    /// Read `positive - negative` in volts, reconfiguring only what differs
    /// from the cached state.
    pub fn read(&mut self, positive: Input, negative: Input, gain: Gain) -> Result<f32, AdcError> {
        if self.active != Some((positive, negative)) {
            self.set_channel(positive, negative)?;
        }
        if self.gain != gain {
            self.set_gain(gain)?;
        }
        if self.mode != ConversionMode::Continuous {
            self.enter_continuous()?;
        }

        let mut data = [0u8; 2];
        self.i2c
            .write_read(self.address, &[cmd::RDATA], &mut data)
            .map_err(bus_error)?;
        Ok(self.code_to_volts(i16::from_be_bytes(data)))
    }

    pub fn reference(&self) -> Reference {
        self.reference
    }

    /// `code * (vref / 2^15) / |gain|`, using the cached gain.
    pub fn code_to_volts(&self, code: i16) -> f32 {
        f32::from(code) * (self.reference.volts() / FULL_SCALE_CODES) / f32::from(self.gain.magnitude())
    }

    // ── Register access ───────────────────────────────────────

    fn enter_continuous(&mut self) -> Result<(), AdcError> {
        let config1 = CONFIG1_CONTINUOUS | self.reference.config1_bits();
        if self.write_verified(regs::CONFIG1, config1)? {
            self.start()?;
            self.mode = ConversionMode::Continuous;
        }
        Ok(())
    }

    fn command(&mut self, command: u8) -> Result<(), AdcError> {
        self.i2c.write(self.address, &[command]).map_err(bus_error)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, AdcError> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(self.address, &[cmd::RREG | (reg << 2)], &mut value)
            .map_err(bus_error)?;
        Ok(value[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), AdcError> {
        self.i2c
            .write(self.address, &[cmd::WREG | (reg << 2), value])
            .map_err(bus_error)
    }

    /// Write then read back.  `Ok(false)` on mismatch (logged, not fatal).
    fn write_verified(&mut self, reg: u8, value: u8) -> Result<bool, AdcError> {
        self.write_register(reg, value)?;
        let readback = self.read_register(reg)?;
        if readback == value {
            Ok(true)
        } else {
            error!(
                "ADS112C04 0x{:02X}: register {reg} write 0x{value:02X} read back 0x{readback:02X}",
                self.address
            );
            Ok(false)
        }
    }
}

impl<I2C: I2c> ExternalAdc for Ads112c04<I2C> {
    fn address(&self) -> u8 {
        self.address
    }

    fn gain(&self) -> Gain {
        self.gain
    }

    fn set_gain(&mut self, gain: Gain) -> Result<(), AdcError> {
        Ads112c04::set_gain(self, gain)
    }

    fn read(&mut self, positive: Input, negative: Input, gain: Gain) -> Result<f32, AdcError> {
        Ads112c04::read(self, positive, negative, gain)
    }
}

// ---------------------------------------------------------------------------
// Boot-time converter table
// ---------------------------------------------------------------------------

/// Shared handle to one converter; sensors keep only a `Weak` to it.
pub type SharedAdc = Rc<RefCell<dyn ExternalAdc>>;

/// Converters indexed by `ADCIndex - 1`, in bus-scan order.  A slot is
/// empty when the device at that position failed reset.
#[derive(Default)]
pub struct AdcSet {
    slots: Vec<Option<SharedAdc>>,
}

impl AdcSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one driver per scanned address inside the ADS112C04 window.
    pub fn from_scan<I2C>(bus: &I2C, addresses: &[u8], reference: Reference) -> Self
    where
        I2C: I2c + Clone + 'static,
    {
        use crate::pins::{ADS_ADDR_FIRST, ADS_ADDR_LAST, MAX_EXTERNAL_ADCS};

        let mut set = Self::new();
        for &addr in addresses {
            if !(ADS_ADDR_FIRST..=ADS_ADDR_LAST).contains(&addr) {
                debug!("I2C 0x{addr:02X}: not an ADS112C04 address, skipped");
                continue;
            }
            if set.len() == MAX_EXTERNAL_ADCS {
                warn!("I2C 0x{addr:02X}: more than {MAX_EXTERNAL_ADCS} ADCs, ignored");
                continue;
            }
            match Ads112c04::new(bus.clone(), addr, reference) {
                Ok(adc) => {
                    let adc: SharedAdc = Rc::new(RefCell::new(adc));
                    set.push(Some(adc));
                }
                Err(e) => {
                    error!("ADS112C04 0x{addr:02X}: {e}; slot left empty");
                    set.push(None);
                }
            }
        }
        set
    }

    pub fn push(&mut self, adc: Option<SharedAdc>) {
        self.slots.push(adc);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Weak handle for a config `ADCIndex` (1-based).  `Ok(None)` when the
    /// slot is missing or empty; out-of-range indices are config faults.
    pub fn handle(&self, index: i32) -> Result<Option<Weak<RefCell<dyn ExternalAdc>>>, Error> {
        if !(1..=crate::pins::MAX_EXTERNAL_ADCS as i32).contains(&index) {
            return Err(Error::Config("ADCIndex must be between 0 and 4"));
        }
        match self.slots.get(index as usize - 1) {
            Some(Some(adc)) => Ok(Some(Rc::downgrade(adc))),
            _ => {
                warn!("ADCIndex {index}: no working ADC at that position");
                Ok(None)
            }
        }
    }
}

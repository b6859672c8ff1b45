//! Simulated peripherals for host builds and tests.
//!
//! | Type           | Stands in for                         |
//! |----------------|---------------------------------------|
//! | [`SimBus`]     | I²C bus with ADS112C04 register models|
//! | [`SimLocalAdc`]| ESP32-S3 oneshot ADC                  |
//! | [`SimPin`]     | GPIO push-pull output                 |
//!
//! The bus model decodes the converter's command set (RESET, START,
//! POWERDOWN, RDATA, RREG, WREG), records every transaction and can be told
//! to misbehave: a non-zero reset value or a register that ignores writes.

use core::cell::Cell;
use core::convert::Infallible;
use std::collections::BTreeMap;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin, StatefulOutputPin};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::drivers::local_adc::LocalAdc;
use crate::error::SensorError;

// ── I²C bus ───────────────────────────────────────────────────

/// One recorded bus transaction: all written bytes, then the read length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub addr: u8,
    pub write: Vec<u8>,
    pub read_len: usize,
}

#[derive(Debug, Default)]
struct SimAds {
    regs: [u8; 4],
    reset_value: u8,
    stuck: [bool; 4],
    /// Conversion result per MUX code.
    conversions: BTreeMap<u8, u16>,
    converting: bool,
}

impl SimAds {
    /// Apply one write phase; returns the bytes a following read sees.
    fn handle_write(&mut self, bytes: &[u8]) -> Vec<u8> {
        let Some(&command) = bytes.first() else {
            return Vec::new();
        };
        let reg = usize::from((command >> 2) & 0x03);
        match command {
            c if c & 0xFE == 0x06 => {
                self.regs = [0; 4];
                self.regs[0] = self.reset_value;
                self.converting = false;
            }
            c if c & 0xFE == 0x08 => self.converting = true,
            c if c & 0xFE == 0x02 => self.converting = false,
            c if c & 0xFE == 0x10 => {
                let mux = self.regs[0] >> 4;
                let code = self.conversions.get(&mux).copied().unwrap_or(0);
                return code.to_be_bytes().to_vec();
            }
            c if c & 0xF0 == 0x20 => return vec![self.regs[reg]],
            c if c & 0xF0 == 0x40 => {
                match bytes.get(1) {
                    Some(&value) if !self.stuck[reg] => self.regs[reg] = value,
                    _ => {}
                }
            }
            _ => {}
        }
        Vec::new()
    }
}

/// Simulated I²C bus.  Addresses without a device NACK.
#[derive(Debug, Default)]
pub struct SimBus {
    devices: BTreeMap<u8, SimAds>,
    log: Vec<Transaction>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an ADS112C04 model at `addr`.
    pub fn add_ads(&mut self, addr: u8) {
        self.devices.insert(addr, SimAds::default());
    }

    /// Raw conversion code returned while `mux` is selected.
    pub fn set_conversion(&mut self, addr: u8, mux: u8, code: u16) {
        if let Some(dev) = self.devices.get_mut(&addr) {
            dev.conversions.insert(mux, code);
        }
    }

    /// CONFIG0 value the device comes out of RESET with (0 when healthy).
    pub fn set_reset_value(&mut self, addr: u8, value: u8) {
        if let Some(dev) = self.devices.get_mut(&addr) {
            dev.reset_value = value;
        }
    }

    /// Make `reg` silently ignore WREG so read-back verification fails.
    pub fn stick_register(&mut self, addr: u8, reg: u8, stuck: bool) {
        if let Some(dev) = self.devices.get_mut(&addr) {
            dev.stuck[usize::from(reg & 0x03)] = stuck;
        }
    }

    pub fn register(&self, addr: u8, reg: u8) -> u8 {
        self.devices
            .get(&addr)
            .map_or(0, |dev| dev.regs[usize::from(reg & 0x03)])
    }

    pub fn is_converting(&self, addr: u8) -> bool {
        self.devices.get(&addr).is_some_and(|dev| dev.converting)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl ErrorType for SimBus {
    type Error = ErrorKind;
}

impl I2c for SimBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let Some(dev) = self.devices.get_mut(&address) else {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        };

        let mut record = Transaction {
            addr: address,
            write: Vec::new(),
            read_len: 0,
        };
        let mut response = Vec::new();
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    record.write.extend_from_slice(bytes);
                    response = dev.handle_write(bytes);
                }
                Operation::Read(buf) => {
                    record.read_len += buf.len();
                    for (i, byte) in buf.iter_mut().enumerate() {
                        *byte = response.get(i).copied().unwrap_or(0);
                    }
                }
            }
        }
        self.log.push(record);
        Ok(())
    }
}

// ── On-chip ADC ───────────────────────────────────────────────

/// Fixed counts per GPIO; unknown pins fail like an unconfigured channel.
#[derive(Debug, Default)]
pub struct SimLocalAdc {
    counts: BTreeMap<i32, u16>,
}

impl SimLocalAdc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, gpio: i32, counts: u16) {
        self.counts.insert(gpio, counts.min(crate::pins::LOCAL_ADC_MAX_COUNTS));
    }
}

impl LocalAdc for SimLocalAdc {
    fn read_raw(&mut self, gpio: i32) -> Result<u16, SensorError> {
        self.counts
            .get(&gpio)
            .copied()
            .ok_or(SensorError::LocalReadFailed)
    }
}

// ── GPIO output ───────────────────────────────────────────────

/// Output pin whose level and write count are shared between clones, so a
/// test can keep one clone after handing the other to a control.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    high: Rc<Cell<bool>>,
    writes: Rc<Cell<u32>>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> bool {
        self.high.get()
    }

    /// Number of `set_high`/`set_low` calls so far.
    pub fn writes(&self) -> u32 {
        self.writes.get()
    }

    fn drive(&self, high: bool) {
        self.high.set(high);
        self.writes.set(self.writes.get() + 1);
    }
}

impl PinErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high.get())
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high.get())
    }
}

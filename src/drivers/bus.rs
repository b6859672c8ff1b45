//! Shared I²C bus handle and the bus-scan primitive.
//!
//! Every ADS112C04 on the board hangs off one bus.  The whole firmware runs
//! on a single cooperative executor, so a `RefCell` is enough: a borrow is
//! only ever held for the duration of one synchronous transaction.

use core::cell::RefCell;
use std::rc::Rc;

use embedded_hal::i2c::{ErrorType, I2c, Operation};

/// First and last non-reserved 7-bit addresses.
const SCAN_FIRST: u8 = 0x08;
const SCAN_LAST: u8 = 0x77;

/// Cloneable handle to one physical bus.
pub struct SharedI2c<I2C> {
    inner: Rc<RefCell<I2C>>,
}

impl<I2C> SharedI2c<I2C> {
    pub fn new(bus: I2C) -> Self {
        Self {
            inner: Rc::new(RefCell::new(bus)),
        }
    }

    /// Run `f` with exclusive access to the underlying bus.
    pub fn with<R>(&self, f: impl FnOnce(&mut I2C) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }
}

impl<I2C> Clone for SharedI2c<I2C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<I2C: I2c> ErrorType for SharedI2c<I2C> {
    type Error = I2C::Error;
}

impl<I2C: I2c> I2c for SharedI2c<I2C> {
    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.borrow_mut().read(address, read)
    }

    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.inner.borrow_mut().write(address, write)
    }

    fn write_read(&mut self, address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.borrow_mut().write_read(address, write, read)
    }

    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.inner.borrow_mut().transaction(address, operations)
    }
}

/// Probe every non-reserved address with a zero-length write and return
/// those that acknowledged, in ascending order.
pub fn scan<I2C: I2c>(bus: &mut I2C) -> Vec<u8> {
    let found: Vec<u8> = (SCAN_FIRST..=SCAN_LAST)
        .filter(|&addr| bus.write(addr, &[]).is_ok())
        .collect();
    log::info!(
        "I2C scan: {} device(s) {:02X?}",
        found.len(),
        found.as_slice()
    );
    found
}

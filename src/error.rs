//! Unified error types for the node firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! connection loop's error handling uniform.  All variants are `Copy` so
//! they can be passed through the FSM and the command engine without
//! allocation.
//!
//! | Class                 | Variant            | Handling                          |
//! |-----------------------|--------------------|-----------------------------------|
//! | hardware / bus fault  | [`AdcError`]       | logged, driver stays best-effort  |
//! | invalid argument      | [`SensorError`],   | reported to the client as text    |
//! |                       | [`ControlError`]   |                                   |
//! | transport fault       | [`CommsError`]     | connection FSM → ERROR → WAITING  |
//! | configuration fault   | `Error::Config`    | fatal at boot only                |

use core::fmt;

use embedded_hal::i2c::ErrorKind;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The external ADC or its bus misbehaved.
    Adc(AdcError),
    /// A sensor could not produce a reading.
    Sensor(SensorError),
    /// A control output could not be actuated.
    Control(ControlError),
    /// The client connection failed.
    Comms(CommsError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adc(e) => write!(f, "adc: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Control(e) => write!(f, "control: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// External ADC errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcError {
    /// The I2C transaction itself failed (NACK, arbitration loss, ...).
    Bus(ErrorKind),
    /// Registers did not read back as zero after a RESET command.
    ResetFailed { readback: u8 },
    /// The (positive, negative) pair has no multiplexer code.
    InvalidChannel,
    /// Gain is not one of -1 (bypass), 1, 2, 4, ..., 128.
    InvalidGain(i32),
}

impl fmt::Display for AdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(kind) => write!(f, "I2C bus error ({kind:?})"),
            Self::ResetFailed { readback } => {
                write!(f, "reset verification failed (register 0 = 0x{readback:02X})")
            }
            Self::InvalidChannel => write!(f, "invalid multiplexer channel pair"),
            Self::InvalidGain(g) => write!(f, "invalid PGA gain {g}"),
        }
    }
}

impl std::error::Error for AdcError {}

impl From<AdcError> for Error {
    fn from(e: AdcError) -> Self {
        Self::Adc(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Requested unit is not produced by this sensor kind.
    InvalidUnit { valid: &'static [&'static str] },
    /// The external ADC this sensor references is absent or failed reset.
    AdcUnavailable,
    /// The on-chip ADC returned an error.
    LocalReadFailed,
    /// A pin number cannot be mapped to an ADC input.
    InvalidPin(i32),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUnit { valid } => {
                write!(f, "invalid unit, valid units are: {}", valid.join(", "))
            }
            Self::AdcUnavailable => write!(f, "external ADC unavailable"),
            Self::LocalReadFailed => write!(f, "on-chip ADC read failed"),
            Self::InvalidPin(pin) => write!(f, "pin {pin} is not an ADC input"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Control errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// No control is registered under the requested name.
    UnknownControl,
    /// Action is neither OPEN nor CLOSE.
    InvalidAction,
    /// The output pin refused the level change.
    PinWriteFailed,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownControl => write!(f, "unknown control"),
            Self::InvalidAction => write!(f, "invalid action"),
            Self::PinWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<ControlError> for Error {
    fn from(e: ControlError) -> Self {
        Self::Control(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// An outbound frame exceeds the link block size.
    FrameTooLarge { len: usize, max: usize },
    /// An inbound command line exceeds the line buffer.
    LineTooLong,
    /// An inbound command line is not valid UTF-8.
    InvalidUtf8,
    /// The peer closed the connection.
    PeerClosed,
    /// Socket read/write failed.
    Socket(std::io::ErrorKind),
    /// The listener failed to accept.
    AcceptFailed(std::io::ErrorKind),
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameTooLarge { len, max } => {
                write!(f, "frame of {len} bytes exceeds the {max}-byte block")
            }
            Self::LineTooLong => write!(f, "command line too long"),
            Self::InvalidUtf8 => write!(f, "command line is not UTF-8"),
            Self::PeerClosed => write!(f, "connection closed by client"),
            Self::Socket(kind) => write!(f, "socket error ({kind})"),
            Self::AcceptFailed(kind) => write!(f, "accept failed ({kind})"),
        }
    }
}

impl std::error::Error for CommsError {}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

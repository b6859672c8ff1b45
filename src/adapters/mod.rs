//! Adapters — concrete implementations of the node's ports.
//!
//! | Adapter    | Implements               | Connects to                  |
//! |------------|--------------------------|------------------------------|
//! | `esp`      | LocalAdc                 | ESP32-S3 ADC1 oneshot        |
//! |            | StatefulOutputPin        | ESP32-S3 GPIO                |
//! | `log_sink` | EventSink                | Serial / terminal log        |
//! | `sim`      | I2c, LocalAdc,           | In-memory models (host)      |
//! |            | StatefulOutputPin        |                              |
//! | `ssdp`     | —                        | UDP multicast discovery      |
//! | `tcp`      | Listener / Link          | TCP control channel          |
//! | `time`     | —                        | ESP32 system timer / Instant |
//! | `wifi`     | —                        | ESP-IDF Wi-Fi STA            |

#[cfg(target_os = "espidf")]
pub mod esp;
pub mod log_sink;
pub mod sim;
pub mod ssdp;
pub mod tcp;
pub mod time;
pub mod wifi;

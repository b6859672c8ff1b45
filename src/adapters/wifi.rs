//! Wi-Fi station association.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`connect`] brings up the ESP-IDF station
//!   driver and blocks until DHCP hands out an address.
//! - **all other targets**: only credential validation; the host binary
//!   binds to whatever interface it is told to.

use core::fmt;

use crate::config::NetworkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no Wi-Fi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "Wi-Fi connection failed"),
        }
    }
}

impl std::error::Error for WifiError {}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

/// Validated station credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut creds = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        creds
            .ssid
            .push_str(ssid)
            .map_err(|_| WifiError::InvalidSsid)?;
        creds
            .password
            .push_str(password)
            .map_err(|_| WifiError::InvalidPassword)?;
        Ok(creds)
    }

    pub fn from_config(network: Option<&NetworkConfig>) -> Result<Self, WifiError> {
        let network = network.ok_or(WifiError::NoCredentials)?;
        Self::new(&network.ssid, &network.password)
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF station
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use station::connect;

#[cfg(target_os = "espidf")]
mod station {
    use core::net::Ipv4Addr;

    use esp_idf_hal::modem::Modem;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{
        AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi,
    };
    use log::{error, info};

    use super::{Credentials, WifiError};

    /// Associate and wait for an address.  The returned driver must be kept
    /// alive for the link to stay up.
    pub fn connect(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        creds: &Credentials,
    ) -> Result<(BlockingWifi<EspWifi<'static>>, Ipv4Addr), WifiError> {
        let fail = |e: esp_idf_sys::EspError| {
            error!("Wi-Fi: {e}");
            WifiError::ConnectionFailed
        };

        let driver = EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(fail)?;
        let mut wifi = BlockingWifi::wrap(driver, sysloop).map_err(fail)?;
        let auth_method = if creds.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: creds.ssid.clone(),
            password: creds.password.clone(),
            auth_method,
            ..Default::default()
        }))
        .map_err(fail)?;

        info!("Wi-Fi: connecting to '{}'", creds.ssid);
        wifi.start().map_err(fail)?;
        wifi.connect().map_err(fail)?;
        wifi.wait_netif_up().map_err(fail)?;

        let ip = wifi.wifi().sta_netif().get_ip_info().map_err(fail)?.ip;
        info!("Wi-Fi: connected, IP {ip}");
        Ok((wifi, ip))
    }
}

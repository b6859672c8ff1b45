//! ESP-IDF peripherals behind the crate's ports.
//!
//! | Type            | Implements                       | Peripheral          |
//! |-----------------|----------------------------------|---------------------|
//! | [`OneshotAdc`]  | [`LocalAdc`]                     | ADC1 oneshot, 12 dB |
//! | [`GpioOutput`]  | `OutputPin` / `StatefulOutputPin`| push-pull GPIO      |
//!
//! Both use raw `esp-idf-sys` calls; channels and pins are chosen at run
//! time from the device config, which the typed HAL drivers cannot do.

use std::collections::BTreeSet;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin, StatefulOutputPin};
use esp_idf_svc::sys::*;
use log::{info, warn};

use crate::drivers::local_adc::LocalAdc;
use crate::error::{ControlError, SensorError};

// ── ADC (oneshot) ─────────────────────────────────────────────

/// ADC1 on the ESP32-S3: GPIO1..=GPIO10 map to channels 0..=9.
fn adc1_channel(gpio: i32) -> Option<adc_channel_t> {
    (1..=10).contains(&gpio).then(|| (gpio - 1) as adc_channel_t)
}

pub struct OneshotAdc {
    handle: adc_oneshot_unit_handle_t,
    configured: BTreeSet<adc_channel_t>,
}

impl OneshotAdc {
    pub fn new() -> Result<Self, SensorError> {
        let init_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
        // SAFETY: init_cfg and handle outlive the call; ADC1 is claimed once.
        let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) };
        if ret != ESP_OK as i32 {
            warn!("ADC1 init failed (rc={ret})");
            return Err(SensorError::LocalReadFailed);
        }
        info!("ADC1 oneshot unit ready");
        Ok(Self {
            handle,
            configured: BTreeSet::new(),
        })
    }

    fn configure(&mut self, channel: adc_channel_t) -> Result<(), SensorError> {
        if self.configured.contains(&channel) {
            return Ok(());
        }
        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        // SAFETY: handle is a live unit created in new().
        let ret = unsafe { adc_oneshot_config_channel(self.handle, channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            warn!("ADC1 channel {channel} config failed (rc={ret})");
            return Err(SensorError::LocalReadFailed);
        }
        self.configured.insert(channel);
        Ok(())
    }
}

impl LocalAdc for OneshotAdc {
    fn read_raw(&mut self, gpio: i32) -> Result<u16, SensorError> {
        let channel = adc1_channel(gpio).ok_or(SensorError::InvalidPin(gpio))?;
        self.configure(channel)?;
        let mut raw: i32 = 0;
        // SAFETY: channel was configured on this unit above.
        let ret = unsafe { adc_oneshot_read(self.handle, channel, &mut raw) };
        if ret != ESP_OK as i32 {
            return Err(SensorError::LocalReadFailed);
        }
        Ok(raw.clamp(0, i32::from(crate::pins::LOCAL_ADC_MAX_COUNTS)) as u16)
    }
}

impl Drop for OneshotAdc {
    fn drop(&mut self) {
        // SAFETY: handle came from adc_oneshot_new_unit and is not used again.
        unsafe { adc_oneshot_del_unit(self.handle) };
    }
}

// ── GPIO outputs ──────────────────────────────────────────────

pub struct GpioOutput {
    gpio: i32,
    high: bool,
}

impl GpioOutput {
    /// Configure `gpio` as a push-pull output, driven low.
    pub fn new(gpio: i32) -> Result<Self, ControlError> {
        if !(0..64).contains(&gpio) {
            return Err(ControlError::PinWriteFailed);
        }
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << gpio,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: cfg is a valid, fully initialised config.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            warn!("GPIO{gpio} config failed (rc={ret})");
            return Err(ControlError::PinWriteFailed);
        }
        let mut pin = Self { gpio, high: true };
        pin.write(false).map_err(|_| ControlError::PinWriteFailed)?;
        Ok(pin)
    }

    fn write(&mut self, high: bool) -> Result<(), ErrorKind> {
        // SAFETY: gpio was configured as an output in new().
        let ret = unsafe { gpio_set_level(self.gpio, u32::from(high)) };
        if ret != ESP_OK as i32 {
            return Err(ErrorKind::Other);
        }
        self.high = high;
        Ok(())
    }
}

impl ErrorType for GpioOutput {
    type Error = ErrorKind;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

impl StatefulOutputPin for GpioOutput {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}
